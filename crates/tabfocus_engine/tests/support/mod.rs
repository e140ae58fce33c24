#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::{Mutex, Once};

use serde_json::{Map, Value};
use tabfocus_core::{GroupColor, GroupId, GroupInfo, HostTab, OrganizeScope, TabId, WindowId};
use tabfocus_engine::{CreateTab, HostError, KeyValueStore, MemoryStore, StoreError, TabHost};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tabfocus_logging::initialize_for_tests);
}

pub fn host_tab(id: TabId, window_id: WindowId, title: &str, url: &str) -> HostTab {
    HostTab {
        id,
        window_id,
        index: id as u32,
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        pinned: false,
        group_id: None,
    }
}

#[derive(Default)]
struct Browser {
    tabs: Vec<HostTab>,
    groups: HashMap<GroupId, GroupInfo>,
    next_id: i64,
    refuse_close: HashSet<TabId>,
    refuse_placed_create: bool,
    refuse_batch_ungroup: bool,
    created: Vec<CreateTab>,
}

/// In-memory browser with just enough tab-group behavior for engine tests.
#[derive(Default)]
pub struct FakeHost {
    browser: Mutex<Browser>,
}

impl FakeHost {
    pub fn new(tabs: Vec<HostTab>) -> Self {
        let host = Self::default();
        {
            let mut browser = host.browser.lock().unwrap();
            browser.next_id = 1000;
            browser.tabs = tabs;
        }
        host
    }

    /// Put existing tabs into a pre-existing group.
    pub fn with_group(
        self,
        group_id: GroupId,
        title: &str,
        color: GroupColor,
        tab_ids: &[TabId],
    ) -> Self {
        {
            let mut browser = self.browser.lock().unwrap();
            browser.groups.insert(
                group_id,
                GroupInfo {
                    title: title.to_string(),
                    color: Some(color),
                },
            );
            for tab in browser.tabs.iter_mut().filter(|t| tab_ids.contains(&t.id)) {
                tab.group_id = Some(group_id);
            }
        }
        self
    }

    pub fn refuse_close(&self, tab_id: TabId) {
        self.browser.lock().unwrap().refuse_close.insert(tab_id);
    }

    pub fn refuse_placed_create(&self) {
        self.browser.lock().unwrap().refuse_placed_create = true;
    }

    /// Ungrouping more than one tab per call fails.
    pub fn refuse_batch_ungroup(&self) {
        self.browser.lock().unwrap().refuse_batch_ungroup = true;
    }

    pub fn tabs(&self) -> Vec<HostTab> {
        self.browser.lock().unwrap().tabs.clone()
    }

    pub fn created(&self) -> Vec<CreateTab> {
        self.browser.lock().unwrap().created.clone()
    }

    pub fn remove_tabs(&self, tab_ids: &[TabId]) {
        self.browser
            .lock()
            .unwrap()
            .tabs
            .retain(|tab| !tab_ids.contains(&tab.id));
    }

    /// Group title, color and members for every live group, sorted by title.
    pub fn composition(&self) -> Vec<(String, Option<GroupColor>, BTreeSet<TabId>)> {
        let browser = self.browser.lock().unwrap();
        let mut members: HashMap<GroupId, BTreeSet<TabId>> = HashMap::new();
        for tab in &browser.tabs {
            if let Some(group_id) = tab.group_id {
                members.entry(group_id).or_default().insert(tab.id);
            }
        }
        let mut listing: Vec<_> = members
            .into_iter()
            .map(|(group_id, tabs)| {
                let info = browser.groups.get(&group_id);
                (
                    info.map(|i| i.title.clone()).unwrap_or_default(),
                    info.and_then(|i| i.color),
                    tabs,
                )
            })
            .collect();
        listing.sort_by(|a, b| a.0.cmp(&b.0));
        listing
    }

    pub fn ungrouped(&self) -> BTreeSet<TabId> {
        self.browser
            .lock()
            .unwrap()
            .tabs
            .iter()
            .filter(|tab| tab.group_id.is_none())
            .map(|tab| tab.id)
            .collect()
    }
}

#[async_trait::async_trait]
impl TabHost for FakeHost {
    async fn query_tabs(&self, scope: OrganizeScope) -> Result<Vec<HostTab>, HostError> {
        let browser = self.browser.lock().unwrap();
        Ok(match scope {
            OrganizeScope::All => browser.tabs.clone(),
            OrganizeScope::Current => browser
                .tabs
                .iter()
                .filter(|tab| tab.window_id == 1)
                .cloned()
                .collect(),
        })
    }

    async fn group_info(&self, group_id: GroupId) -> Result<GroupInfo, HostError> {
        self.browser
            .lock()
            .unwrap()
            .groups
            .get(&group_id)
            .cloned()
            .ok_or_else(|| HostError::new("group_info", format!("no group {group_id}")))
    }

    async fn group(
        &self,
        tab_ids: &[TabId],
        _window_id: Option<WindowId>,
    ) -> Result<GroupId, HostError> {
        let mut browser = self.browser.lock().unwrap();
        let known = tab_ids
            .iter()
            .all(|id| browser.tabs.iter().any(|tab| tab.id == *id));
        if tab_ids.is_empty() || !known {
            return Err(HostError::new("group", "unknown tab"));
        }
        browser.next_id += 1;
        let group_id = browser.next_id;
        browser.groups.insert(
            group_id,
            GroupInfo {
                title: String::new(),
                color: None,
            },
        );
        for tab in browser.tabs.iter_mut().filter(|t| tab_ids.contains(&t.id)) {
            tab.group_id = Some(group_id);
        }
        Ok(group_id)
    }

    async fn update_group(
        &self,
        group_id: GroupId,
        title: &str,
        color: GroupColor,
    ) -> Result<(), HostError> {
        let mut browser = self.browser.lock().unwrap();
        let info = browser
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| HostError::new("update_group", "unknown group"))?;
        info.title = title.to_string();
        info.color = Some(color);
        Ok(())
    }

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<(), HostError> {
        let mut browser = self.browser.lock().unwrap();
        if browser.refuse_batch_ungroup && tab_ids.len() > 1 {
            return Err(HostError::new("ungroup", "batch ungroup unsupported"));
        }
        for tab in browser.tabs.iter_mut().filter(|t| tab_ids.contains(&t.id)) {
            tab.group_id = None;
        }
        Ok(())
    }

    async fn close_tab(&self, tab_id: TabId) -> Result<(), HostError> {
        let mut browser = self.browser.lock().unwrap();
        if browser.refuse_close.contains(&tab_id) {
            return Err(HostError::new("close_tab", "tab is busy"));
        }
        let before = browser.tabs.len();
        browser.tabs.retain(|tab| tab.id != tab_id);
        if browser.tabs.len() == before {
            return Err(HostError::new("close_tab", format!("no tab {tab_id}")));
        }
        Ok(())
    }

    async fn create_tab(&self, request: CreateTab) -> Result<TabId, HostError> {
        let mut browser = self.browser.lock().unwrap();
        if browser.refuse_placed_create && request.window_id.is_some() {
            return Err(HostError::new("create_tab", "window is gone"));
        }
        browser.next_id += 1;
        let id = browser.next_id;
        let tab = HostTab {
            id,
            window_id: request.window_id.unwrap_or(1),
            index: request.index.unwrap_or(0),
            title: None,
            url: Some(request.url.clone()),
            pinned: false,
            group_id: None,
        };
        browser.tabs.push(tab);
        browser.created.push(request);
        Ok(id)
    }
}

/// Memory store whose writes fail once a write touches one of the broken keys.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    broken: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn break_key(&self, key: &str) {
        self.broken.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        self.inner.get(keys).await
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        let refused = {
            let broken = self.broken.lock().unwrap();
            values.keys().find(|key| broken.contains(*key)).cloned()
        };
        if let Some(key) = refused {
            return Err(StoreError::Io(io::Error::other(format!("disk full writing {key}"))));
        }
        self.inner.set(values).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.broken.lock().unwrap().contains(key) {
            return Err(StoreError::Io(io::Error::other(format!("disk full removing {key}"))));
        }
        self.inner.remove(key).await
    }
}
