//! In-memory collaborators for behavioural tests.
//!
//! [`FakeBrowser`] models just enough of a site to drive both block layouts,
//! the Field UI display form, and frame waits. It keeps a simulated clock:
//! a wait advances the clock until its condition holds or its budget is spent,
//! so timing behaviour is observable without sleeping.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use stepkit::content::{ContentApi, ContentResult};
use stepkit::error::{ContentError, IdentityError, SessionError};
use stepkit::identity::{ActingIdentity, IdentityProvider};
use stepkit::session::{BrowserSession, ElementHandle, PageElement, SessionResult};
use stepkit::wait::AJAX_IDLE_EXPRESSION;

/// Region used by the in-place editor when the add form has no region select.
pub(crate) const DEFAULT_IN_PLACE_REGION: &str = "content";

#[derive(Debug, Clone)]
struct WizardRow {
    id: u32,
    label: String,
    region: String,
    menu_open: bool,
}

#[derive(Debug, Clone, Default)]
enum WizardForm {
    #[default]
    Closed,
    ChoosingBlock,
    Configuring {
        label: String,
        region: Option<String>,
    },
}

#[derive(Debug, Default)]
struct WizardPage {
    enabled: bool,
    offered: BTreeSet<String>,
    rows: Vec<WizardRow>,
    next_id: u32,
    form: WizardForm,
}

#[derive(Debug, Default)]
struct InPlacePage {
    enabled: bool,
    region_select: bool,
    offered: BTreeSet<(String, String)>,
    tray_open: bool,
    category: Option<String>,
    plugin: Option<String>,
    pending_region: Option<String>,
    placed: Vec<(String, String)>,
    save_menu_open: bool,
    saved: Option<SavedLayout>,
}

/// A layout stored through the in-place editor's save menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SavedLayout {
    pub(crate) save_type: String,
    pub(crate) blocks: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Page {
    clock_ms: u64,
    frames: BTreeMap<String, u64>,
    elements: BTreeMap<String, u64>,
    wizard: WizardPage,
    in_place: InPlacePage,
    path: Option<String>,
    checked: BTreeSet<String>,
    log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    BlockTable,
    TableBody,
    Row(u32),
    RowSelect(u32),
    RowCell(u32),
    Dropbutton(u32),
    DropbuttonToggle(u32),
    DeleteLink(u32),
    TrayLink,
    CategoryLink(String),
    PluginLink(String),
    AddButton,
    RegionSelect,
    PlacedBlock { region: String, plugin_id: String },
    SaveLink,
    SaveEntry(String),
    Generic(String),
}

/// Shared, cloneable fake browser session.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBrowser {
    page: Arc<Mutex<Page>>,
}

/// An element handle into a [`FakeBrowser`] page.
#[derive(Debug, Clone)]
pub(crate) struct FakeElement {
    page: Arc<Mutex<Page>>,
    node: Node,
}

fn lock(page: &Arc<Mutex<Page>>) -> SessionResult<MutexGuard<'_, Page>> {
    page.lock().map_err(|_| SessionError::Driver {
        message: String::from("fake page lock poisoned"),
    })
}

fn not_found(locator: &str) -> SessionError {
    SessionError::ElementNotFound {
        locator: String::from(locator),
    }
}

/// Extract `[name="value"]` pairs from a CSS selector, in order.
fn attribute_pairs(selector: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut chars = selector.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '[' {
            continue;
        }
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ']' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            continue;
        }
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.next() != Some('"') {
            continue;
        }
        let mut value = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                '"' => break,
                other => value.push(other),
            }
        }
        pairs.push((String::from(name.trim()), value));
    }
    pairs
}

/// Reverse JavaScript string-literal escaping.
fn unescape_js(value: &str) -> String {
    let mut plain = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('0') => plain.push('\0'),
                Some('n') => plain.push('\n'),
                Some('r') => plain.push('\r'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                    plain.push(decoded.unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                Some(other) => plain.push(other),
                None => plain.push('\\'),
            }
        } else {
            plain.push(ch);
        }
    }
    plain
}

/// Return the contents of a double-quoted literal wrapped by `prefix` and
/// `suffix`.
fn quoted_between(expression: &str, prefix: &str, suffix: &str) -> Option<String> {
    expression
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .map(unescape_js)
}

impl Page {
    fn resolve(&self, selector: &str) -> Vec<Node> {
        let pairs = attribute_pairs(selector);
        let pair_refs: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        if selector == "table#blocks" {
            return if self.wizard.enabled {
                vec![Node::BlockTable]
            } else {
                Vec::new()
            };
        }

        if let Some(save_type) = selector.strip_prefix("a.panelizer-ipe-save-") {
            return if self.in_place.save_menu_open && matches!(save_type, "custom" | "default") {
                vec![Node::SaveEntry(String::from(save_type))]
            } else {
                Vec::new()
            };
        }

        match pair_refs.as_slice() {
            [("title", "Manage Content")] if self.in_place.enabled => vec![Node::TrayLink],
            [("title", "Save")] if self.in_place.enabled => vec![Node::SaveLink],
            [("data-category", category)] if self.in_place.tray_open => {
                let offered = self
                    .in_place
                    .offered
                    .iter()
                    .any(|(offered_category, _)| offered_category.as_str() == *category);
                if offered {
                    vec![Node::CategoryLink(String::from(*category))]
                } else {
                    Vec::new()
                }
            }
            [("data-plugin-id", plugin_id)] => match &self.in_place.category {
                Some(category)
                    if self
                        .in_place
                        .offered
                        .contains(&(category.clone(), String::from(*plugin_id))) =>
                {
                    vec![Node::PluginLink(String::from(*plugin_id))]
                }
                _ => Vec::new(),
            },
            [("value", "Add")] if self.in_place.plugin.is_some() => vec![Node::AddButton],
            [("name", "region")] if self.in_place.plugin.is_some() && self.in_place.region_select => {
                vec![Node::RegionSelect]
            }
            [("data-region-name", region), ("data-block-plugin-id", plugin_id)] => self
                .in_place
                .placed
                .iter()
                .filter(|(placed_region, placed_plugin)| {
                    placed_region.as_str() == *region && placed_plugin.as_str() == *plugin_id
                })
                .map(|(placed_region, placed_plugin)| Node::PlacedBlock {
                    region: placed_region.clone(),
                    plugin_id: placed_plugin.clone(),
                })
                .collect(),
            _ => match self.elements.get(selector) {
                Some(&appears_at) if appears_at <= self.clock_ms => {
                    vec![Node::Generic(String::from(selector))]
                }
                _ => Vec::new(),
            },
        }
    }

    /// Milliseconds from now until `expression` holds, if it ever will.
    fn time_until(&self, expression: &str) -> Result<Option<u64>, SessionError> {
        if expression == AJAX_IDLE_EXPRESSION {
            return Ok(Some(0));
        }
        if let Some(name) = quoted_between(expression, "typeof window.frames[\"", "\"] === \"undefined\"") {
            return Ok(match self.frames.get(&name) {
                Some(&appears_at) if appears_at <= self.clock_ms => None,
                _ => Some(0),
            });
        }
        if let Some(name) = quoted_between(expression, "window.frames[\"", "\"]") {
            return Ok(self
                .frames
                .get(&name)
                .map(|&appears_at| appears_at.saturating_sub(self.clock_ms)));
        }
        if let Some(selector) = quoted_between(expression, "document.querySelector(\"", "\")") {
            if !self.resolve(&selector).is_empty() {
                return Ok(Some(0));
            }
            return Ok(self
                .elements
                .get(&selector)
                .map(|&appears_at| appears_at.saturating_sub(self.clock_ms)));
        }
        Err(SessionError::Driver {
            message: format!("fake browser cannot evaluate: {expression}"),
        })
    }

    fn row_mut(&mut self, id: u32) -> Option<&mut WizardRow> {
        self.wizard.rows.iter_mut().find(|row| row.id == id)
    }

    fn row(&self, id: u32) -> Option<&WizardRow> {
        self.wizard.rows.iter().find(|row| row.id == id)
    }
}

impl FakeBrowser {
    /// Create an empty page with the clock at zero.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn page(&self) -> SessionResult<MutexGuard<'_, Page>> {
        lock(&self.page)
    }

    fn element(&self, node: Node) -> ElementHandle {
        Box::new(FakeElement {
            page: Arc::clone(&self.page),
            node,
        })
    }

    fn with_page<T>(&self, f: impl FnOnce(&mut Page) -> T) -> T {
        match self.page.lock() {
            Ok(mut page) => f(&mut page),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Enable the layout wizard and offer `label` in its block list.
    pub(crate) fn offer_wizard_block(&self, label: &str) {
        self.with_page(|page| {
            page.wizard.enabled = true;
            page.wizard.offered.insert(String::from(label));
        });
    }

    /// List `label` in `region` of the wizard block table without driving the
    /// wizard, as a previous run might have left it.
    pub(crate) fn list_wizard_block(&self, label: &str, region: &str) {
        self.with_page(|page| {
            page.wizard.enabled = true;
            let id = page.wizard.next_id;
            page.wizard.next_id = id.saturating_add(1);
            page.wizard.rows.push(WizardRow {
                id,
                label: String::from(label),
                region: String::from(region),
                menu_open: false,
            });
        });
    }

    /// Enable the in-place editor and offer `plugin_id` under `category`.
    pub(crate) fn offer_in_place_block(&self, category: &str, plugin_id: &str) {
        self.with_page(|page| {
            page.in_place.enabled = true;
            page.in_place.region_select = true;
            page.in_place
                .offered
                .insert((String::from(category), String::from(plugin_id)));
        });
    }

    /// The layout most recently stored through the in-place save menu.
    pub(crate) fn saved_layout(&self) -> Option<SavedLayout> {
        self.with_page(|page| page.in_place.saved.clone())
    }

    /// Make a frame named `name` appear `delay_ms` from now.
    pub(crate) fn frame_appears_after(&self, name: &str, delay_ms: u64) {
        self.with_page(|page| {
            let at = page.clock_ms.saturating_add(delay_ms);
            page.frames.insert(String::from(name), at);
        });
    }

    /// Make an element matching `selector` appear `delay_ms` from now.
    pub(crate) fn element_appears_after(&self, selector: &str, delay_ms: u64) {
        self.with_page(|page| {
            let at = page.clock_ms.saturating_add(delay_ms);
            page.elements.insert(String::from(selector), at);
        });
    }

    /// Current simulated time in milliseconds.
    pub(crate) fn clock_ms(&self) -> u64 {
        self.with_page(|page| page.clock_ms)
    }

    /// Whether `option` is checked on the form at `path`.
    pub(crate) fn is_checked(&self, path: &str, option: &str) -> bool {
        self.with_page(|page| page.checked.contains(&format!("{path}|{option}")))
    }

    /// Every interaction so far, oldest first.
    pub(crate) fn log(&self) -> Vec<String> {
        self.with_page(|page| page.log.clone())
    }
}

impl BrowserSession for FakeBrowser {
    fn wait(&self, timeout_ms: u64, expression: &str) -> SessionResult<bool> {
        let mut page = self.page()?;
        match page.time_until(expression)? {
            Some(delay) if delay <= timeout_ms => {
                page.clock_ms = page.clock_ms.saturating_add(delay);
                Ok(true)
            }
            _ => {
                page.clock_ms = page.clock_ms.saturating_add(timeout_ms);
                Ok(false)
            }
        }
    }

    fn execute_script(&self, script: &str) -> SessionResult<()> {
        self.page()?.log.push(format!("script {script}"));
        Ok(())
    }

    fn evaluate_script(&self, script: &str) -> SessionResult<serde_json::Value> {
        self.page()?.log.push(format!("evaluate {script}"));
        Ok(serde_json::Value::Null)
    }

    fn visit(&self, path: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        page.path = Some(String::from(path));
        page.log.push(format!("visit {path}"));
        Ok(())
    }

    fn switch_to_window(&self) -> SessionResult<()> {
        self.page()?.log.push(String::from("switch to window"));
        Ok(())
    }

    fn switch_to_frame(&self, name: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        let present = page
            .frames
            .get(name)
            .is_some_and(|&appears_at| appears_at <= page.clock_ms);
        if !present {
            return Err(not_found(name));
        }
        page.log.push(format!("switch to frame {name}"));
        Ok(())
    }

    fn find(&self, selector: &str) -> SessionResult<Option<ElementHandle>> {
        let first = self.page()?.resolve(selector).into_iter().next();
        Ok(first.map(|node| self.element(node)))
    }

    fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementHandle>> {
        let nodes = self.page()?.resolve(selector);
        Ok(nodes.into_iter().map(|node| self.element(node)).collect())
    }

    fn click_link(&self, locator: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        page.log.push(format!("link {locator}"));
        let form = page.wizard.form.clone();
        match form {
            _ if locator == "Add new block" => {
                if !page.wizard.enabled {
                    return Err(not_found(locator));
                }
                page.wizard.form = WizardForm::ChoosingBlock;
            }
            WizardForm::ChoosingBlock => {
                if !page.wizard.offered.contains(locator) {
                    return Err(not_found(locator));
                }
                page.wizard.form = WizardForm::Configuring {
                    label: String::from(locator),
                    region: None,
                };
            }
            WizardForm::Closed | WizardForm::Configuring { .. } => {}
        }
        Ok(())
    }

    fn press_button(&self, locator: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        page.log.push(format!("press {locator}"));
        if locator != "Add block" {
            return Ok(());
        }
        let WizardForm::Configuring {
            label,
            region: Some(region),
        } = page.wizard.form.clone()
        else {
            return Err(not_found(locator));
        };
        let id = page.wizard.next_id;
        page.wizard.next_id = id.saturating_add(1);
        page.wizard.rows.push(WizardRow {
            id,
            label,
            region,
            menu_open: false,
        });
        page.wizard.form = WizardForm::Closed;
        Ok(())
    }

    fn select_option(&self, select: &str, option: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        page.log.push(format!("select {select}={option}"));
        if select != "region" {
            return Ok(());
        }
        if let WizardForm::Configuring { label, .. } = page.wizard.form.clone() {
            page.wizard.form = WizardForm::Configuring {
                label,
                region: Some(String::from(option)),
            };
        } else if page.in_place.plugin.is_some() {
            page.in_place.pending_region = Some(String::from(option));
        } else {
            return Err(not_found(select));
        }
        Ok(())
    }

    fn check_option(&self, locator: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        let key = format!("{}|{locator}", page.path.clone().unwrap_or_default());
        page.checked.insert(key);
        page.log.push(format!("check {locator}"));
        Ok(())
    }

    fn uncheck_option(&self, locator: &str) -> SessionResult<()> {
        let mut page = self.page()?;
        let key = format!("{}|{locator}", page.path.clone().unwrap_or_default());
        page.checked.remove(&key);
        page.log.push(format!("uncheck {locator}"));
        Ok(())
    }
}

impl FakeElement {
    fn child(&self, node: Node) -> ElementHandle {
        Box::new(Self {
            page: Arc::clone(&self.page),
            node,
        })
    }
}

impl PageElement for FakeElement {
    fn click(&self) -> SessionResult<()> {
        let mut page = lock(&self.page)?;
        page.log.push(format!("click {:?}", self.node));
        match &self.node {
            Node::DropbuttonToggle(id) => {
                let row = page.row_mut(*id).ok_or_else(|| not_found("li.dropbutton-toggle"))?;
                row.menu_open = true;
            }
            Node::DeleteLink(id) => {
                let open = page.row(*id).is_some_and(|row| row.menu_open);
                if !open {
                    return Err(SessionError::Driver {
                        message: String::from("element not interactable: Delete"),
                    });
                }
                page.wizard.rows.retain(|row| row.id != *id);
            }
            Node::TrayLink => page.in_place.tray_open = true,
            Node::CategoryLink(category) => {
                page.in_place.category = Some(category.clone());
                page.in_place.plugin = None;
            }
            Node::PluginLink(plugin_id) => page.in_place.plugin = Some(plugin_id.clone()),
            Node::AddButton => {
                let Some(plugin_id) = page.in_place.plugin.take() else {
                    return Err(not_found("[value=\"Add\"]"));
                };
                let region = page
                    .in_place
                    .pending_region
                    .take()
                    .unwrap_or_else(|| String::from(DEFAULT_IN_PLACE_REGION));
                page.in_place.placed.push((region, plugin_id));
                page.in_place.tray_open = false;
                page.in_place.category = None;
            }
            Node::SaveLink => page.in_place.save_menu_open = true,
            Node::SaveEntry(save_type) => {
                page.in_place.saved = Some(SavedLayout {
                    save_type: save_type.clone(),
                    blocks: page.in_place.placed.clone(),
                });
                page.in_place.save_menu_open = false;
            }
            Node::BlockTable
            | Node::TableBody
            | Node::Row(_)
            | Node::RowSelect(_)
            | Node::RowCell(_)
            | Node::Dropbutton(_)
            | Node::RegionSelect
            | Node::PlacedBlock { .. }
            | Node::Generic(_) => {}
        }
        Ok(())
    }

    fn attribute(&self, name: &str) -> SessionResult<Option<String>> {
        Ok(match (&self.node, name) {
            (Node::PlacedBlock { plugin_id, .. }, "data-block-plugin-id") => Some(plugin_id.clone()),
            (Node::PlacedBlock { region, .. }, "data-region-name") => Some(region.clone()),
            _ => None,
        })
    }

    fn text(&self) -> SessionResult<String> {
        let page = lock(&self.page)?;
        Ok(match &self.node {
            Node::RowCell(id) => page
                .row(*id)
                .map(|row| format!("\n    {}  ", row.label))
                .unwrap_or_default(),
            Node::PlacedBlock { plugin_id, .. } => plugin_id.clone(),
            _ => String::new(),
        })
    }

    fn value(&self) -> SessionResult<Option<String>> {
        let page = lock(&self.page)?;
        Ok(match &self.node {
            Node::RowSelect(id) => page.row(*id).map(|row| row.region.clone()),
            _ => None,
        })
    }

    fn find(&self, selector: &str) -> SessionResult<Option<ElementHandle>> {
        let page = lock(&self.page)?;
        let node = match (&self.node, selector) {
            (Node::BlockTable, "tbody") => Some(Node::TableBody),
            (Node::Row(id), "select.block-region-select") => Some(Node::RowSelect(*id)),
            (Node::Row(id), "td") => Some(Node::RowCell(*id)),
            (Node::Row(id), "ul.dropbutton") => Some(Node::Dropbutton(*id)),
            (Node::Dropbutton(id), "li.dropbutton-toggle") => Some(Node::DropbuttonToggle(*id)),
            _ => None,
        };
        let exists = match &node {
            Some(Node::RowSelect(id) | Node::RowCell(id) | Node::Dropbutton(id) | Node::DropbuttonToggle(id)) => {
                page.row(*id).is_some()
            }
            Some(_) => true,
            None => false,
        };
        drop(page);
        Ok(node.filter(|_| exists).map(|found| self.child(found)))
    }

    fn find_all(&self, selector: &str) -> SessionResult<Vec<ElementHandle>> {
        let page = lock(&self.page)?;
        let ids: Vec<u32> = match (&self.node, selector) {
            (Node::TableBody | Node::BlockTable, "tr") => page.wizard.rows.iter().map(|row| row.id).collect(),
            _ => Vec::new(),
        };
        drop(page);
        Ok(ids.into_iter().map(|id| self.child(Node::Row(id))).collect())
    }

    fn find_link(&self, locator: &str) -> SessionResult<Option<ElementHandle>> {
        let page = lock(&self.page)?;
        let link = match (&self.node, locator) {
            (Node::Dropbutton(id), "Delete") if page.row(*id).is_some() => Some(Node::DeleteLink(*id)),
            _ => None,
        };
        drop(page);
        Ok(link.map(|node| self.child(node)))
    }
}

/// Shared, cloneable fake identity provider.
#[derive(Debug, Clone)]
pub(crate) struct FakeIdentity {
    acting: Arc<Mutex<ActingIdentity>>,
}

impl FakeIdentity {
    /// Start acting as `identity`.
    pub(crate) fn starting_as(identity: ActingIdentity) -> Self {
        Self {
            acting: Arc::new(Mutex::new(identity)),
        }
    }

    fn set(&self, identity: ActingIdentity) -> Result<(), IdentityError> {
        let mut acting = self
            .acting
            .lock()
            .map_err(|_| IdentityError::IdentityUnavailable {
                reason: String::from("fake identity lock poisoned"),
            })?;
        *acting = identity;
        Ok(())
    }
}

impl IdentityProvider for FakeIdentity {
    fn current(&self) -> ActingIdentity {
        self.acting
            .lock()
            .map_or(ActingIdentity::Anonymous, |acting| acting.clone())
    }

    fn authenticate_by_role(&self, roles: &BTreeSet<String>) -> Result<ActingIdentity, IdentityError> {
        let name = format!(
            "test_{}",
            roles.iter().cloned().collect::<Vec<_>>().join("_")
        );
        let identity = ActingIdentity::Named(name);
        self.set(identity.clone())?;
        Ok(identity)
    }

    fn authenticate_by_name(&self, name: &str) -> Result<ActingIdentity, IdentityError> {
        let identity = ActingIdentity::Named(String::from(name));
        self.set(identity.clone())?;
        Ok(identity)
    }

    fn reset_to_anonymous(&self) -> Result<(), IdentityError> {
        self.set(ActingIdentity::Anonymous)
    }
}

/// Fake content API exposing `node` bundles to Field UI.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FakeContent;

impl ContentApi for FakeContent {
    fn field_ui_path(&self, entity_type: &str, bundle: Option<&str>) -> ContentResult<Option<String>> {
        Ok(match (entity_type, bundle) {
            ("node", Some(name)) => Some(format!("admin/structure/types/manage/{name}")),
            _ => None,
        })
    }

    fn config_entity_exists(&self, _entity_type: &str, _id: &str) -> ContentResult<bool> {
        Ok(false)
    }

    fn delete_config_entity(&self, entity_type: &str, id: &str) -> ContentResult<()> {
        Err(ContentError::Backend {
            message: format!("{entity_type} {id} does not exist"),
        })
    }
}
