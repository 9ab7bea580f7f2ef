pub mod configuration;
pub mod guidance;
pub mod launch_stages;
pub mod rocket;
