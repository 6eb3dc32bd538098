use crate::errors::{Result, ThrowawayError};

/// Quote a single word so it stays one argument in a POSIX shell
pub fn escape(word: &str) -> Result<String> {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| ThrowawayError::config(format!("Cannot quote {:?}: {}", word, e)))
}

/// Quote every word individually and join them with spaces
pub fn join<S: AsRef<str>>(words: &[S]) -> Result<String> {
    let quoted = words
        .iter()
        .map(|word| escape(word.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words_untouched() {
        assert_eq!(escape("docker").unwrap(), "docker");
        assert_eq!(escape("throwaway-0a1b2c").unwrap(), "throwaway-0a1b2c");
    }

    #[test]
    fn test_hostile_words_stay_single_arguments() {
        let words = [
            "echo",
            "$(rm -rf /)",
            "a b",
            "it's",
            "/tmp/with space:/data",
            "K=v;w",
            "",
        ];
        let line = join(&words).unwrap();

        let parsed = shlex::split(&line).expect("quoted line must parse");
        assert_eq!(parsed, words.iter().map(|w| w.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_nul_byte_is_rejected() {
        let error = escape("bad\0word").unwrap_err();
        assert!(matches!(error, ThrowawayError::Config(_)));
    }
}
