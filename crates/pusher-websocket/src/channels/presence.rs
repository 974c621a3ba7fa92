use std::collections::HashMap;

use serde_json::{Map, Value};

/// One member of a presence channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
	pub id: String,
	pub info: Value,
}

/// The set of members currently joined to a presence channel, plus the
/// locally cached id of this client's own member.
#[derive(Debug, Default)]
pub struct MemberRoster {
	members: HashMap<String, Value>,
	my_id: Option<String>,
}

impl MemberRoster {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Replace the whole roster from the subscription ack's `presence.hash`.
	pub(crate) fn replace_all(&mut self, hash: &Map<String, Value>) {
		self.members = hash.iter().map(|(id, info)| (id.clone(), info.clone())).collect();
	}

	/// Insert or overwrite a member, returning the stored entry.
	pub(crate) fn insert(&mut self, id: String, info: Value) -> Member {
		self.members.insert(id.clone(), info.clone());
		Member { id, info }
	}

	/// Remove a member; absent ids yield `None`.
	pub(crate) fn remove(&mut self, id: &str) -> Option<Member> {
		self.members.remove(id).map(|info| Member { id: id.to_string(), info })
	}

	pub(crate) fn set_my_id(&mut self, id: String) {
		self.my_id = Some(id);
	}

	#[must_use]
	pub fn my_id(&self) -> Option<&str> {
		self.my_id.as_deref()
	}

	/// All members, ordered by id.
	#[must_use]
	pub fn members(&self) -> Vec<Member> {
		let mut members: Vec<Member> = self
			.members
			.iter()
			.map(|(id, info)| Member {
				id: id.clone(),
				info: info.clone(),
			})
			.collect();
		members.sort_by(|a, b| a.id.cmp(&b.id));
		members
	}

	/// This client's own member entry, once known and joined.
	#[must_use]
	pub fn me(&self) -> Option<Member> {
		let id = self.my_id.as_deref()?;
		self.members.get(id).map(|info| Member {
			id: id.to_string(),
			info: info.clone(),
		})
	}

	#[must_use]
	pub fn contains(&self, id: &str) -> bool {
		self.members.contains_key(id)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.members.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn hash(value: Value) -> Map<String, Value> {
		value.as_object().unwrap().clone()
	}

	#[test]
	fn test_replace_all_swaps_roster_atomically() {
		let mut roster = MemberRoster::new();
		roster.insert("stale".to_string(), json!({}));

		roster.replace_all(&hash(json!({ "a": {}, "b": { "name": "B" } })));

		assert_eq!(roster.len(), 2);
		assert!(roster.contains("a"));
		assert!(roster.contains("b"));
		assert!(!roster.contains("stale"));
	}

	#[test]
	fn test_insert_overwrites_duplicate_id() {
		let mut roster = MemberRoster::new();
		roster.insert("a".to_string(), json!({ "v": 1 }));
		let member = roster.insert("a".to_string(), json!({ "v": 2 }));

		assert_eq!(roster.len(), 1);
		assert_eq!(member.info, json!({ "v": 2 }));
	}

	#[test]
	fn test_remove_absent_id_is_none() {
		let mut roster = MemberRoster::new();

		assert!(roster.remove("ghost").is_none());
	}

	#[test]
	fn test_members_are_ordered_by_id() {
		let mut roster = MemberRoster::new();
		roster.replace_all(&hash(json!({ "c": {}, "a": {}, "b": {} })));

		let ids: Vec<String> = roster.members().into_iter().map(|m| m.id).collect();
		assert_eq!(ids, vec!["a", "b", "c"]);
	}

	#[test]
	fn test_me_requires_joined_member() {
		let mut roster = MemberRoster::new();
		roster.set_my_id("me".to_string());

		assert_eq!(roster.my_id(), Some("me"));
		assert!(roster.me().is_none());

		roster.insert("me".to_string(), json!({ "name": "M" }));
		assert_eq!(roster.me().unwrap().info, json!({ "name": "M" }));
	}
}
