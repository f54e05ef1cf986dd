use uuid::Uuid;

/// Stack ids are time-ordered, so sorting by id sorts by creation.
pub fn new_stack_id() -> Uuid {
    Uuid::now_v7()
}

pub fn parse_stack_id(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s).ok()
}
