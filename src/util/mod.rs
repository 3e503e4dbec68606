use std::collections::HashMap;

pub mod secrets;

/// Strips `prefix` from every key that starts with it, so `mysql_host` and `host` are read the
/// same way.
#[must_use]
pub fn remove_prefix_from_hashmap_keys<V>(
    hashmap: HashMap<String, V>,
    prefix: &str,
) -> HashMap<String, V> {
    hashmap
        .into_iter()
        .map(|(key, value)| {
            let new_key = match key.strip_prefix(prefix) {
                Some(stripped) => stripped.to_string(),
                None => key,
            };
            (new_key, value)
        })
        .collect()
}

/// Whether `sql` is a query: after optional leading whitespace it starts with the `SELECT`
/// keyword (any case) followed by whitespace.
#[must_use]
pub fn is_select_statement(sql: &str) -> bool {
    let sql = sql.trim_start();
    let Some(keyword) = sql.get(..6) else {
        return false;
    };
    keyword.eq_ignore_ascii_case("SELECT") && sql[6..].starts_with(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_remove_prefix() {
        let hashmap = HashMap::from([
            ("mysql_host".to_string(), "db".to_string()),
            ("mysql_port".to_string(), "3307".to_string()),
            ("user".to_string(), "app".to_string()),
        ]);

        let result = remove_prefix_from_hashmap_keys(hashmap, "mysql_");

        let expected = HashMap::from([
            ("host".to_string(), "db".to_string()),
            ("port".to_string(), "3307".to_string()),
            ("user".to_string(), "app".to_string()),
        ]);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_full_prefix() {
        let hashmap = HashMap::from([("oracle_".to_string(), 1)]);
        let result = remove_prefix_from_hashmap_keys(hashmap, "oracle_");
        assert_eq!(result, HashMap::from([(String::new(), 1)]));
    }

    #[rstest]
    #[case("SELECT * FROM orders", true)]
    #[case("  select id FROM orders", true)]
    #[case("\n\tSelect\nid FROM orders", true)]
    #[case("SELECT", false)]
    #[case("SELECTED", false)]
    #[case("UPDATE orders SET a = 1", false)]
    #[case("WITH t AS (SELECT 1) SELECT * FROM t", false)]
    #[case("", false)]
    fn test_is_select_statement(#[case] sql: &str, #[case] expected: bool) {
        assert_eq!(is_select_statement(sql), expected);
    }
}
