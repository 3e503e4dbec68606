use secrecy::SecretString;
use std::collections::HashMap;

/// Wraps every value of a plain connection parameter map in a [`SecretString`].
#[must_use]
pub fn to_secret_map<S: ::std::hash::BuildHasher + ::std::default::Default>(
    map: HashMap<String, String, S>,
) -> HashMap<String, SecretString, S> {
    map.into_iter()
        .map(|(k, v)| (k, SecretString::from(v)))
        .collect()
}
