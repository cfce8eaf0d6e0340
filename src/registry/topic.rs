//! Topic names
//!
//! Topics are free-form strings. Three of them are produced by the server
//! itself; `all` is an alias that expands to exactly those three.

/// Read operations (list/get)
pub const QUERY: &str = "query";

/// Successful create/update/delete
pub const MUTATION: &str = "mutation";

/// Messages from the random producer
pub const RANDOM: &str = "random";

/// Alias for every server-produced topic; never stored as an entry
pub const ALL: &str = "all";

/// Concrete topics `all` expands to
pub const SERVER_TOPICS: [&str; 3] = [QUERY, MUTATION, RANDOM];

/// Expand a requested topic into the concrete topics it names
pub fn expand(topic: &str) -> Vec<&str> {
    if topic == ALL {
        SERVER_TOPICS.to_vec()
    } else {
        vec![topic]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_all() {
        assert_eq!(expand("all"), vec!["query", "mutation", "random"]);
    }

    #[test]
    fn test_expand_plain_topic() {
        assert_eq!(expand("mutation"), vec!["mutation"]);
        assert_eq!(expand("chat-room-7"), vec!["chat-room-7"]);
    }

    #[test]
    fn test_expand_is_case_sensitive() {
        assert_eq!(expand("ALL"), vec!["ALL"]);
    }
}
