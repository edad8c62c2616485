//! Shared test host: records every view-host call so workflows can assert
//! on mount/unmount traffic.
#![allow(dead_code)]

use treedit::{Editor, EditorOptions, Node, ViewHost};

#[derive(Debug, Default)]
pub struct RecordingHost {
    next: u32,
    pub created: usize,
    pub mounts: Vec<(u32, Option<u32>, usize)>,
    pub unmounts: Vec<u32>,
    pub refreshes: usize,
    pub scrolled_to: Vec<u32>,
    pub highlights: Vec<(u32, bool)>,
}

impl ViewHost for RecordingHost {
    type Handle = u32;

    fn create(&mut self, _node: &Node) -> u32 {
        self.next += 1;
        self.created += 1;
        self.next
    }

    fn create_append(&mut self, _owner: &Node) -> u32 {
        self.next += 1;
        self.created += 1;
        self.next
    }

    fn mount(&mut self, handle: u32, parent: Option<u32>, index: usize) {
        self.mounts.push((handle, parent, index));
    }

    fn unmount(&mut self, handle: u32) {
        self.unmounts.push(handle);
    }

    fn refresh(&mut self, _handle: u32, _node: &Node) {
        self.refreshes += 1;
    }

    fn set_highlight(&mut self, handle: u32, on: bool) {
        self.highlights.push((handle, on));
    }

    fn scroll_to(&mut self, handle: u32) {
        self.scrolled_to.push(handle);
    }
}

pub fn editor() -> Editor<RecordingHost> {
    Editor::new(RecordingHost::default(), EditorOptions::default())
}
