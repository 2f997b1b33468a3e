//! Debounce timer core and application state.
//!
//! # Architecture
//!
//! - [`timer`] - the debounced multi-callback countdown. This is the heart
//!   of the application: everything else is glue around it.
//! - [`validate`] - branch-name check against the configured regex.
//! - [`app`] - one input session: fields, status, AI panels, and the three
//!   callbacks bound to the timer.
//!
//! The timer ticks on its own spawned task; callback results cross back to
//! the frame loop over an event channel, so rendering state is only ever
//! mutated by [`App::process_events`].

pub mod app;
pub mod timer;
pub mod validate;

pub use app::{App, AppEvent, Field, Panel, THINKING_PLACEHOLDER};
pub use timer::{AsyncCallback, CallbackTimer, TimerConfigError};
pub use validate::{PatternError, validate};

pub use brancheck_config::{BrancheckConfig, ConfigError, Settings};
pub use brancheck_types::ValidationStatus;
