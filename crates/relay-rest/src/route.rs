//! REST routes
//!
//! A route is an HTTP method plus a path template such as
//! `/channels/{channel_id}/messages`. Rate-limit buckets are keyed by the
//! template with only the major parameters filled in, so calls that differ
//! in minor ids (a message id, a user id) share one bucket.

use relay_core::Snowflake;
use reqwest::Method;
use std::fmt;

/// Parameters that partition a bucket
pub const MAJOR_PARAMETERS: [&str; 3] = ["channel_id", "guild_id", "webhook_id"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    template: &'static str,
    params: Vec<(&'static str, String)>,
}

impl Route {
    #[must_use]
    pub fn new(method: Method, template: &'static str) -> Self {
        Self {
            method,
            template,
            params: Vec::new(),
        }
    }

    /// Bind a `{name}` placeholder
    #[must_use]
    pub fn param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Path with every placeholder substituted
    pub fn path(&self) -> String {
        self.substitute(|_| true)
    }

    /// Major parameter values, joined, or empty when the route has none
    pub fn major_key(&self) -> String {
        self.params
            .iter()
            .filter(|(name, _)| MAJOR_PARAMETERS.contains(name))
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Bucket key used until the server names the bucket
    pub fn bucket_key(&self) -> String {
        format!(
            "{} {}",
            self.method,
            self.substitute(|name| MAJOR_PARAMETERS.contains(&name))
        )
    }

    fn substitute(&self, keep: impl Fn(&str) -> bool) -> String {
        let mut path = self.template.to_string();
        for (name, value) in &self.params {
            if keep(name) {
                path = path.replace(&format!("{{{name}}}"), value);
            }
        }
        path
    }

    pub fn gateway_bot() -> Self {
        Self::new(Method::GET, "/gateway/bot")
    }

    pub fn get_channel(channel_id: Snowflake) -> Self {
        Self::new(Method::GET, "/channels/{channel_id}").param("channel_id", channel_id)
    }

    pub fn create_message(channel_id: Snowflake) -> Self {
        Self::new(Method::POST, "/channels/{channel_id}/messages").param("channel_id", channel_id)
    }

    pub fn get_message(channel_id: Snowflake, message_id: Snowflake) -> Self {
        Self::new(Method::GET, "/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", channel_id)
            .param("message_id", message_id)
    }

    pub fn delete_message(channel_id: Snowflake, message_id: Snowflake) -> Self {
        Self::new(Method::DELETE, "/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", channel_id)
            .param("message_id", message_id)
    }

    pub fn get_guild(guild_id: Snowflake) -> Self {
        Self::new(Method::GET, "/guilds/{guild_id}").param("guild_id", guild_id)
    }

    pub fn get_guild_member(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self::new(Method::GET, "/guilds/{guild_id}/members/{user_id}")
            .param("guild_id", guild_id)
            .param("user_id", user_id)
    }

    pub fn execute_webhook(webhook_id: Snowflake, token: &str) -> Self {
        Self::new(Method::POST, "/webhooks/{webhook_id}/{webhook_token}")
            .param("webhook_id", webhook_id)
            .param("webhook_token", token)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_substitution() {
        let route = Route::get_message(Snowflake::new(10), Snowflake::new(20));
        assert_eq!(route.path(), "/channels/10/messages/20");
        assert_eq!(route.to_string(), "GET /channels/{channel_id}/messages/{message_id}");
    }

    #[test]
    fn test_minor_ids_share_bucket() {
        let a = Route::get_message(Snowflake::new(10), Snowflake::new(20));
        let b = Route::get_message(Snowflake::new(10), Snowflake::new(21));
        assert_eq!(a.bucket_key(), b.bucket_key());
        assert_eq!(a.bucket_key(), "GET /channels/10/messages/{message_id}");
    }

    #[test]
    fn test_major_ids_split_bucket() {
        let a = Route::create_message(Snowflake::new(1));
        let b = Route::create_message(Snowflake::new(2));
        assert_ne!(a.bucket_key(), b.bucket_key());
        assert_eq!(a.major_key(), "1");
    }

    #[test]
    fn test_method_is_part_of_key() {
        let get = Route::get_message(Snowflake::new(1), Snowflake::new(2));
        let delete = Route::delete_message(Snowflake::new(1), Snowflake::new(2));
        assert_ne!(get.bucket_key(), delete.bucket_key());
    }

    #[test]
    fn test_webhook_token_is_not_major() {
        let route = Route::execute_webhook(Snowflake::new(5), "secret");
        assert_eq!(route.path(), "/webhooks/5/secret");
        assert_eq!(route.bucket_key(), "POST /webhooks/5/{webhook_token}");
        assert_eq!(Route::gateway_bot().major_key(), "");
    }
}
