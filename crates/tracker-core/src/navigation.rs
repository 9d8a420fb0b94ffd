//! Navigation targets the session manager can request after login/logout.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Destination {
    Home,
    Login,
}

impl Destination {
    /// Route name as the front-end's router knows it
    pub fn name(&self) -> &'static str {
        match self {
            Destination::Home => "home",
            Destination::Login => "login",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that can move the user to a named destination.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn push(&self, destination: Destination) -> Result<()>;
}
