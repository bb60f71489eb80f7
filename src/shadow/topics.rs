// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shadow topic names for a single thing.

use crate::error::ConfigError;

/// Inbound shadow topics the synchronizer handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowTopic {
    /// `.../shadow/get/accepted`
    GetAccepted,
    /// `.../shadow/get/rejected`
    GetRejected,
    /// `.../shadow/update/documents`
    UpdateDocuments,
    /// `.../shadow/update/rejected`
    UpdateRejected,
}

impl ShadowTopic {
    /// Topic suffix below the thing's `shadow/` prefix.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::GetAccepted => "get/accepted",
            Self::GetRejected => "get/rejected",
            Self::UpdateDocuments => "update/documents",
            Self::UpdateRejected => "update/rejected",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "get/accepted" => Some(Self::GetAccepted),
            "get/rejected" => Some(Self::GetRejected),
            "update/documents" => Some(Self::UpdateDocuments),
            "update/rejected" => Some(Self::UpdateRejected),
            _ => None,
        }
    }
}

/// Topic names for one thing's classic (unnamed) shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopics {
    thing_name: String,
    /// `$aws/things/<thing>/shadow/`
    prefix: String,
}

impl ShadowTopics {
    /// Creates the topic set for `thing_name`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for an empty name and
    /// `ConfigError::InvalidThingName` if the name contains a topic
    /// separator or wildcard.
    pub fn new(thing_name: impl Into<String>) -> Result<Self, ConfigError> {
        let thing_name = thing_name.into();
        if thing_name.is_empty() {
            return Err(ConfigError::Missing("thing_name"));
        }
        if thing_name.contains(['/', '+', '#']) {
            return Err(ConfigError::InvalidThingName(thing_name));
        }
        let prefix = format!("$aws/things/{thing_name}/shadow/");
        Ok(Self { thing_name, prefix })
    }

    /// Returns the thing name.
    #[must_use]
    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    /// Desired-state update topic.
    #[must_use]
    pub fn update(&self) -> String {
        format!("{}update", self.prefix)
    }

    /// Get-request topic.
    #[must_use]
    pub fn get(&self) -> String {
        format!("{}get", self.prefix)
    }

    /// Get-accepted topic.
    #[must_use]
    pub fn get_accepted(&self) -> String {
        self.inbound(ShadowTopic::GetAccepted)
    }

    /// Update-documents topic.
    #[must_use]
    pub fn update_documents(&self) -> String {
        self.inbound(ShadowTopic::UpdateDocuments)
    }

    /// Full topic name for an inbound shadow topic.
    #[must_use]
    pub fn inbound(&self, topic: ShadowTopic) -> String {
        format!("{}{}", self.prefix, topic.suffix())
    }

    /// Classifies an inbound topic name.
    ///
    /// Returns `None` for topics of other things and for non-inbound
    /// shadow topics.
    #[must_use]
    pub fn classify(&self, topic: &str) -> Option<ShadowTopic> {
        topic
            .strip_prefix(self.prefix.as_str())
            .and_then(ShadowTopic::from_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names() {
        let topics = ShadowTopics::new("lamp-01").unwrap();
        assert_eq!(topics.update(), "$aws/things/lamp-01/shadow/update");
        assert_eq!(topics.get(), "$aws/things/lamp-01/shadow/get");
        assert_eq!(
            topics.get_accepted(),
            "$aws/things/lamp-01/shadow/get/accepted"
        );
        assert_eq!(
            topics.update_documents(),
            "$aws/things/lamp-01/shadow/update/documents"
        );
        assert_eq!(
            topics.inbound(ShadowTopic::UpdateRejected),
            "$aws/things/lamp-01/shadow/update/rejected"
        );
    }

    #[test]
    fn classify_inbound_topics() {
        let topics = ShadowTopics::new("lamp-01").unwrap();
        for kind in [
            ShadowTopic::GetAccepted,
            ShadowTopic::GetRejected,
            ShadowTopic::UpdateDocuments,
            ShadowTopic::UpdateRejected,
        ] {
            assert_eq!(topics.classify(&topics.inbound(kind)), Some(kind));
        }
    }

    #[test]
    fn classify_ignores_other_topics() {
        let topics = ShadowTopics::new("lamp-01").unwrap();
        assert_eq!(topics.classify(&topics.update()), None);
        assert_eq!(topics.classify(&topics.get()), None);
        assert_eq!(
            topics.classify("$aws/things/lamp-02/shadow/get/accepted"),
            None
        );
        assert_eq!(topics.classify("stat/lamp-01/RESULT"), None);
    }

    #[test]
    fn rejects_bad_thing_names() {
        assert!(matches!(
            ShadowTopics::new(""),
            Err(ConfigError::Missing("thing_name"))
        ));
        assert!(matches!(
            ShadowTopics::new("a/b"),
            Err(ConfigError::InvalidThingName(_))
        ));
        assert!(matches!(
            ShadowTopics::new("lamp+"),
            Err(ConfigError::InvalidThingName(_))
        ));
    }
}
