//! Cookie persistence.
//!
//! Cookies set by servers are kept across runs in a JSON file that is loaded
//! when a client opens and saved when it closes.

mod cookie_jar;

pub use cookie_jar::{COOKIE_FILE_VERSION, CookieJarError, PersistentCookieJar, StoredCookie};
