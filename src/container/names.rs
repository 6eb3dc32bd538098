use rand::Rng;

use crate::config::NAME_PREFIX;

/// Generate a fresh `throwaway-<12 hex>` name for an image or a container.
///
/// The suffix comes from the thread-local CSPRNG, so concurrent test runs
/// sharing one daemon do not collide.
pub fn unique_name() -> String {
    let mut bytes = [0u8; 6];
    rand::rng().fill(&mut bytes);
    format!("{}-{}", NAME_PREFIX, hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::collections::HashSet;

    #[test]
    fn test_name_shape() {
        let pattern = Regex::new(r"^throwaway-[0-9a-f]{12}$").unwrap();
        assert!(pattern.is_match(&unique_name()));
    }

    #[test]
    fn test_names_do_not_repeat() {
        let names: HashSet<String> = (0..1000).map(|_| unique_name()).collect();
        assert_eq!(names.len(), 1000);
    }
}
