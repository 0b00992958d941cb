//! Upstream selection for incoming gateway requests.
//!
//! [`decide`] maps a request path to one of the three upstream services.
//! Rules are checked in a fixed order, first match wins:
//!
//! 1. `/api/movies*` goes to the movies service with probability
//!    `migration_percent / 100` when gradual migration is enabled, otherwise
//!    to the monolith. The random source is only consulted when enabled.
//! 2. `/api/events*` always goes to the events service.
//! 3. Everything else goes to the monolith.
//!
//! Prefixes are matched literally on the raw path.

use std::fmt;

use url::Url;

use super::random::RandomSource;
use crate::config::model::GatewayConfig;

pub const MOVIES_PREFIX: &str = "/api/movies";
pub const EVENTS_PREFIX: &str = "/api/events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Monolith,
    MoviesService,
    EventsService,
}

impl Service {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Monolith => "monolith",
            Self::MoviesService => "movies-service",
            Self::EventsService => "events-service",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingDecision<'a> {
    pub service: Service,
    pub target: &'a Url,
}

#[must_use]
pub fn decide<'a>(
    path: &str,
    config: &'a GatewayConfig,
    rng: &dyn RandomSource,
) -> RoutingDecision<'a> {
    let service = choose_service(path, config, rng);
    RoutingDecision {
        service,
        target: target_for(config, service),
    }
}

#[must_use]
pub const fn target_for(config: &GatewayConfig, service: Service) -> &Url {
    match service {
        Service::Monolith => &config.monolith_url,
        Service::MoviesService => &config.movies_service_url,
        Service::EventsService => &config.events_service_url,
    }
}

fn choose_service(path: &str, config: &GatewayConfig, rng: &dyn RandomSource) -> Service {
    if path.starts_with(MOVIES_PREFIX) {
        if config.gradual_migration && rng.draw_percent() < config.migration_percent {
            Service::MoviesService
        } else {
            Service::Monolith
        }
    } else if path.starts_with(EVENTS_PREFIX) {
        Service::EventsService
    } else {
        Service::Monolith
    }
}
