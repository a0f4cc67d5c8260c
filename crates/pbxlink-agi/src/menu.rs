//! Menu trees and the traversal cursor that walks them.
//!
//! A tree is a set of named menus, each an ordered list of command items.
//! Items may branch to another menu on a DTMF result. Trees are immutable
//! once built and are shared read-only between connections; each
//! connection walks its own [`MenuCursor`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::MenuError;
use crate::reply::Reply;

/// Default name of the menu a traversal starts at.
pub const DEFAULT_ENTRY: &str = "entry";

/// Branch slots an item can define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BranchKey {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    Star,
    Pound,
    /// Taken when the result is 0 and no key matched.
    NoResult,
}

impl BranchKey {
    /// Keys matched against the result character, in priority order.
    pub const DTMF: [BranchKey; 12] = [
        BranchKey::Key0,
        BranchKey::Key1,
        BranchKey::Key2,
        BranchKey::Key3,
        BranchKey::Key4,
        BranchKey::Key5,
        BranchKey::Key6,
        BranchKey::Key7,
        BranchKey::Key8,
        BranchKey::Key9,
        BranchKey::Star,
        BranchKey::Pound,
    ];

    const SLOTS: usize = 13;

    /// Character this key answers to; `None` for [`BranchKey::NoResult`].
    pub fn as_char(self) -> Option<char> {
        match self {
            BranchKey::Key0 => Some('0'),
            BranchKey::Key1 => Some('1'),
            BranchKey::Key2 => Some('2'),
            BranchKey::Key3 => Some('3'),
            BranchKey::Key4 => Some('4'),
            BranchKey::Key5 => Some('5'),
            BranchKey::Key6 => Some('6'),
            BranchKey::Key7 => Some('7'),
            BranchKey::Key8 => Some('8'),
            BranchKey::Key9 => Some('9'),
            BranchKey::Star => Some('*'),
            BranchKey::Pound => Some('#'),
            BranchKey::NoResult => None,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        Self::DTMF.into_iter().find(|key| key.as_char() == Some(c))
    }

    /// Label used in menu documents: `"0"`-`"9"`, `"*"`, `"#"`, `"none"`.
    pub fn label(self) -> &'static str {
        match self {
            BranchKey::Key0 => "0",
            BranchKey::Key1 => "1",
            BranchKey::Key2 => "2",
            BranchKey::Key3 => "3",
            BranchKey::Key4 => "4",
            BranchKey::Key5 => "5",
            BranchKey::Key6 => "6",
            BranchKey::Key7 => "7",
            BranchKey::Key8 => "8",
            BranchKey::Key9 => "9",
            BranchKey::Star => "*",
            BranchKey::Pound => "#",
            BranchKey::NoResult => "none",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        if label == "none" {
            return Some(BranchKey::NoResult);
        }
        let mut chars = label.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One command in a menu plus its branch targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuItem {
    command: Option<String>,
    branches: [Option<String>; BranchKey::SLOTS],
}

impl MenuItem {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// An item with no command; reaching it ends the traversal.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn branch(mut self, key: BranchKey, target: impl Into<String>) -> Self {
        self.branches[key.slot()] = Some(target.into());
        self
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref().filter(|command| !command.is_empty())
    }

    pub fn target(&self, key: BranchKey) -> Option<&str> {
        self.branches[key.slot()].as_deref()
    }

    pub fn branches(&self) -> impl Iterator<Item = (BranchKey, &str)> {
        BranchKey::DTMF
            .into_iter()
            .chain([BranchKey::NoResult])
            .filter_map(|key| self.target(key).map(|target| (key, target)))
    }

    /// Menu to jump to for a decoded `result`, if any.
    pub fn branch_for(&self, result: i64) -> Option<&str> {
        let matched = u32::try_from(result)
            .ok()
            .and_then(char::from_u32)
            .and_then(BranchKey::from_char)
            .and_then(|key| self.target(key));
        if matched.is_some() {
            return matched;
        }
        if result == 0 {
            return self.target(BranchKey::NoResult);
        }
        None
    }
}

/// Serialized form of a [`MenuItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branches: BTreeMap<String, String>,
}

/// Serialized form of a [`MenuTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTreeConfig {
    /// Value of `agi_network_script` this tree answers.
    #[serde(alias = "agi_network_script")]
    pub selector: String,
    #[serde(default = "default_entry")]
    pub entry: String,
    pub menus: BTreeMap<String, Vec<MenuItemConfig>>,
}

fn default_entry() -> String {
    DEFAULT_ENTRY.to_string()
}

/// A validated, immutable menu tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuTree {
    selector: String,
    entry: String,
    menus: HashMap<String, Vec<MenuItem>>,
}

impl MenuTree {
    /// Build a tree, checking the selector, the entry menu and every branch target.
    pub fn new<I>(
        selector: impl Into<String>,
        entry: impl Into<String>,
        menus: I,
    ) -> Result<Self, MenuError>
    where
        I: IntoIterator<Item = (String, Vec<MenuItem>)>,
    {
        let tree = Self {
            selector: selector.into(),
            entry: entry.into(),
            menus: menus.into_iter().collect(),
        };
        tree.validate()?;
        Ok(tree)
    }

    pub fn from_config(config: MenuTreeConfig) -> Result<Self, MenuError> {
        let mut menus = HashMap::with_capacity(config.menus.len());
        for (name, items) in config.menus {
            let mut built = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let mut menu_item = MenuItem {
                    command: item.command,
                    ..MenuItem::default()
                };
                for (label, target) in item.branches {
                    let key = BranchKey::from_label(&label).ok_or_else(|| {
                        MenuError::UnknownBranchKey {
                            menu: name.clone(),
                            index,
                            key: label.clone(),
                        }
                    })?;
                    menu_item = menu_item.branch(key, target);
                }
                built.push(menu_item);
            }
            menus.insert(name, built);
        }
        Self::new(config.selector, config.entry, menus)
    }

    pub fn from_json(json: &str) -> Result<Self, MenuError> {
        let config: MenuTreeConfig = serde_json::from_str(json)?;
        Self::from_config(config)
    }

    pub fn to_config(&self) -> MenuTreeConfig {
        let menus = self
            .menus
            .iter()
            .map(|(name, items)| {
                let items = items
                    .iter()
                    .map(|item| MenuItemConfig {
                        command: item.command.clone(),
                        branches: item
                            .branches()
                            .map(|(key, target)| (key.label().to_string(), target.to_string()))
                            .collect(),
                    })
                    .collect();
                (name.clone(), items)
            })
            .collect();
        MenuTreeConfig {
            selector: self.selector.clone(),
            entry: self.entry.clone(),
            menus,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn menu(&self, name: &str) -> Option<&[MenuItem]> {
        self.menus.get(name).map(Vec::as_slice)
    }

    fn validate(&self) -> Result<(), MenuError> {
        if self.selector.trim().is_empty() {
            return Err(MenuError::MissingSelector);
        }
        if !self.menus.contains_key(&self.entry) {
            return Err(MenuError::MissingEntry(self.entry.clone()));
        }
        for (name, items) in &self.menus {
            for (index, item) in items.iter().enumerate() {
                for (_, target) in item.branches() {
                    if !self.menus.contains_key(target) {
                        return Err(MenuError::UnknownBranchTarget {
                            menu: name.clone(),
                            index,
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Where a reply moved the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<'t> {
    /// Jumped to the first item of the named menu.
    Branch(&'t str),
    /// Advanced to the next item of the same menu.
    Next,
    /// Non-success reply, or no item at the cursor; the traversal is over.
    Stop,
}

/// Traversal position `(menu, index)` inside a borrowed tree.
#[derive(Debug, Clone)]
pub struct MenuCursor<'t> {
    tree: &'t MenuTree,
    menu: &'t str,
    index: usize,
}

impl<'t> MenuCursor<'t> {
    pub fn new(tree: &'t MenuTree) -> Self {
        Self {
            tree,
            menu: tree.entry(),
            index: 0,
        }
    }

    pub fn position(&self) -> (&'t str, usize) {
        (self.menu, self.index)
    }

    /// Item under the cursor; `None` when the menu is missing or exhausted.
    pub fn current(&self) -> Option<&'t MenuItem> {
        self.tree.menu(self.menu)?.get(self.index)
    }

    /// Command to issue next; `None` ends the traversal.
    pub fn current_command(&self) -> Option<&'t str> {
        self.current()?.command()
    }

    /// Apply the reply to the current item's command.
    pub fn on_reply(&mut self, reply: &Reply) -> Transition<'t> {
        let Some(item) = self.current() else {
            return Transition::Stop;
        };
        let Reply::Success(decoded) = reply else {
            return Transition::Stop;
        };

        match decoded.result.and_then(|result| item.branch_for(result)) {
            Some(target) => {
                self.menu = target;
                self.index = 0;
                Transition::Branch(target)
            }
            None => {
                self.index += 1;
                Transition::Next
            }
        }
    }
}
