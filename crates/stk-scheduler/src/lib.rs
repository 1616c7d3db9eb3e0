//! Background job scheduling.
//!
//! Two shapes: [`PeriodicJob`] fires once after an initial delay and then at
//! a fixed interval; [`DailyJob`] fires once per day at a wall-clock time.
//! Both run each firing on its own task, so a panic inside the work is
//! logged and the schedule survives. Cancellation stops future firings; a
//! firing already in flight runs to completion.

pub mod daily;
pub mod periodic;

pub use daily::DailyJob;
pub use periodic::PeriodicJob;
