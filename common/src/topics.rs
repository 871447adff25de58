pub const TOPIC_CONTROLLER_STATE: &str = "vivarium/controller/state";
pub const TOPIC_CONTROLLER_AVAILABILITY: &str = "vivarium/controller/status";
