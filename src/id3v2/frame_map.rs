//! Frame collection and management.

use crate::id3v2::frames::{Frame, FrameId};
use indexmap::map::Keys;
use indexmap::IndexMap;
use std::ops::Index;

/// The frames of a tag, as an ordered multi-map.
///
/// Each identifier maps to a non-empty list of frames, since most
/// identifiers may legally repeat as long as the frames'
/// [`key`](Frame::key) values differ. Insertion order is preserved inside
/// and across identifiers; rendering sorts by identifier while leaving the
/// order within one identifier untouched.
#[derive(Debug, Clone, Default)]
pub struct FrameMap {
    map: IndexMap<FrameId, Vec<Box<dyn Frame>>>,
}

impl FrameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frame, replacing any existing frame with the same
    /// [`key`](Frame::key) and appending otherwise.
    #[inline]
    pub fn add(&mut self, frame: impl Frame) {
        self.add_boxed(Box::new(frame));
    }

    pub fn add_boxed(&mut self, frame: Box<dyn Frame>) {
        let list = self.map.entry(frame.id()).or_insert_with(Vec::new);

        match list.iter_mut().find(|entry| entry.key() == frame.key()) {
            Some(entry) => *entry = frame,
            None => list.push(frame),
        }
    }

    /// Appends a frame unconditionally, keeping whatever duplicates may
    /// arise. Parsing uses this so a tag round-trips with its multiplicity
    /// intact; everything else goes through [`add`](FrameMap::add).
    pub(crate) fn push_boxed(&mut self, frame: Box<dyn Frame>) {
        self.map
            .entry(frame.id())
            .or_insert_with(Vec::new)
            .push(frame);
    }

    /// The first frame under an identifier.
    pub fn get(&self, id: &[u8; 4]) -> Option<&dyn Frame> {
        Some(self.map.get(&FrameId::new(id))?.first()?.as_ref())
    }

    pub fn get_mut(&mut self, id: &[u8; 4]) -> Option<&mut dyn Frame> {
        Some(self.map.get_mut(&FrameId::new(id))?.first_mut()?.as_mut())
    }

    /// Every frame under an identifier, in insertion order.
    pub fn get_all(&self, id: &[u8; 4]) -> &[Box<dyn Frame>] {
        self.map
            .get(&FrameId::new(id))
            .map(|list| list.as_slice())
            .unwrap_or_default()
    }

    /// The frame with an exact [`key`](Frame::key), e.g. `"COMM:desc:eng"`.
    pub fn get_key(&self, key: &str) -> Option<&dyn Frame> {
        self.values().find(|frame| frame.key() == key)
    }

    /// Removes and returns every frame under an identifier.
    pub fn remove_all(&mut self, id: &[u8; 4]) -> Vec<Box<dyn Frame>> {
        self.map
            .shift_remove(&FrameId::new(id))
            .unwrap_or_default()
    }

    /// Removes the frame with an exact [`key`](Frame::key).
    pub fn remove_key(&mut self, key: &str) -> Option<Box<dyn Frame>> {
        for list in self.map.values_mut() {
            if let Some(pos) = list.iter().position(|frame| frame.key() == key) {
                let frame = list.remove(pos);
                self.map.retain(|_, list| !list.is_empty());
                return Some(frame);
            }
        }

        None
    }

    pub fn contains_any(&self, id: &[u8; 4]) -> bool {
        self.map.contains_key(&FrameId::new(id))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get_key(key).is_some()
    }

    /// All frames in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &dyn Frame> + '_ {
        self.map.values().flatten().map(|frame| frame.as_ref())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut dyn Frame> + '_ {
        self.map
            .values_mut()
            .flatten()
            .map(|frame| frame.as_mut())
    }

    /// All frames sorted by identifier, stable within one identifier. This
    /// is the order frames are rendered in.
    pub fn all(&self) -> Vec<&dyn Frame> {
        let mut ids: Vec<&FrameId> = self.map.keys().collect();
        ids.sort();

        ids.iter()
            .flat_map(|id| self.map[*id].iter().map(|frame| frame.as_ref()))
            .collect()
    }

    /// The total number of frames across all identifiers.
    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    delegate::delegate! {
        to self.map {
            pub fn clear(&mut self);
            pub fn is_empty(&self) -> bool;
            pub fn keys(&self) -> Keys<FrameId, Vec<Box<dyn Frame>>>;
        }
    }
}

impl Index<&[u8; 4]> for FrameMap {
    type Output = dyn Frame;

    fn index(&self, id: &[u8; 4]) -> &Self::Output {
        self.get(id).expect("no frame with the given id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3v2::frames::CommentsFrame;
    use crate::string::Encoding;

    fn comment(desc: &str, text: &str) -> CommentsFrame {
        CommentsFrame {
            encoding: Encoding::Utf8,
            desc: String::from(desc),
            text: String::from(text),
            ..Default::default()
        }
    }

    #[test]
    fn add_replaces_by_key() {
        let mut map = FrameMap::new();

        map.add(comment("", "one"));
        map.add(comment("other", "two"));
        map.add(comment("", "three"));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get_key("COMM::eng").unwrap().to_string(), "three");
        assert_eq!(map.get_key("COMM:other:eng").unwrap().to_string(), "two");
    }

    #[test]
    fn push_keeps_duplicates() {
        let mut map = FrameMap::new();

        map.push_boxed(Box::new(comment("", "one")));
        map.push_boxed(Box::new(comment("", "two")));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get_all(b"COMM").len(), 2);
    }

    #[test]
    fn all_sorts_by_id() {
        let mut map = FrameMap::new();

        map.add(text_frame! { b"TPE1"; "Artist" });
        map.add(comment("", "comment"));
        map.add(text_frame! { b"TIT2"; "Title" });

        let order: Vec<String> = map.all().iter().map(|f| f.id().to_string()).collect();
        assert_eq!(order, &["COMM", "TIT2", "TPE1"]);
    }

    #[test]
    fn remove_key_drops_empty_lists() {
        let mut map = FrameMap::new();

        map.add(comment("a", "one"));
        assert!(map.remove_key("COMM:a:eng").is_some());
        assert!(!map.contains_any(b"COMM"));
        assert!(map.is_empty());
    }
}
