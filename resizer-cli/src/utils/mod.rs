mod params;

pub use params::parse_stage_workers;
