//! The visibility hierarchy of validation rules.
//!
//! `project < client < organization < global`. A rule's scope only ever
//! widens, one rung at a time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
  Project,
  Client,
  Organization,
  Global,
}

impl Scope {
  /// Every scope, narrowest first.
  pub const ALL: [Scope; 4] =
    [Scope::Project, Scope::Client, Scope::Organization, Scope::Global];

  /// The next rung up the hierarchy. `Global` widens to itself.
  pub fn widen(self) -> Scope {
    match self {
      Self::Project => Self::Client,
      Self::Client => Self::Organization,
      Self::Organization | Self::Global => Self::Global,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Project => "project",
      Self::Client => "client",
      Self::Organization => "organization",
      Self::Global => "global",
    }
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Scope {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "project" => Ok(Self::Project),
      "client" => Ok(Self::Client),
      "organization" => Ok(Self::Organization),
      "global" => Ok(Self::Global),
      other => Err(Error::UnknownScope(other.to_owned())),
    }
  }
}
