use uuid::Uuid;

pub fn create_object_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_format_and_uniqueness() {
        let id = create_object_id("msg");
        assert!(id.starts_with("msg_"));
        assert_eq!(id.len(), "msg_".len() + 32);
        assert_ne!(id, create_object_id("msg"));
    }
}
