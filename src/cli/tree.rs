//! Command prefix tree.
//!
//! One trie per interpreter mode, shared by dispatch-adjacent keyword
//! lookup and tab-completion. The trie holds literal keywords only;
//! arguments (names, ids, address lists) are leaves' children in spirit but
//! never materialized.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use super::CliMode;

/// A node of the keyword trie; an empty node is a terminal.
#[derive(Debug, Default)]
pub struct CommandTree {
    children: BTreeMap<&'static str, CommandTree>,
}

fn leaf() -> CommandTree {
    CommandTree::default()
}

fn node<const N: usize>(children: [(&'static str, CommandTree); N]) -> CommandTree {
    CommandTree {
        children: children.into_iter().collect(),
    }
}

/// The keyword trie for one interpreter mode.
pub fn tree_for_mode(mode: CliMode) -> &'static CommandTree {
    static TREES: OnceLock<HashMap<CliMode, CommandTree>> = OnceLock::new();
    let trees = TREES.get_or_init(build_trees);
    &trees[&mode]
}

fn build_trees() -> HashMap<CliMode, CommandTree> {
    let mut trees = HashMap::new();
    trees.insert(CliMode::Exec, node([("enable", leaf())]));
    trees.insert(
        CliMode::Privileged,
        node([
            ("disable", leaf()),
            ("configure", node([("terminal", leaf())])),
            (
                "show",
                node([
                    ("running-config", leaf()),
                    (
                        "ip",
                        node([
                            ("route", leaf()),
                            ("ospf", leaf()),
                            ("access-lists", leaf()),
                        ]),
                    ),
                ]),
            ),
        ]),
    );
    trees.insert(
        CliMode::Config,
        node([
            ("hostname", leaf()),
            ("interface", leaf()),
            ("vlan", leaf()),
            (
                "spanning-tree",
                node([("mode", node([("rapid-pvst", leaf())])), ("vlan", leaf())]),
            ),
            ("router", node([("ospf", leaf()), ("bgp", leaf())])),
            ("ip", node([("route", leaf())])),
            ("access-list", leaf()),
            ("exit", leaf()),
        ]),
    );
    trees.insert(
        CliMode::ConfigVlan,
        node([("name", leaf()), ("exit", leaf())]),
    );
    trees.insert(
        CliMode::ConfigIf,
        node([
            ("shutdown", leaf()),
            ("description", leaf()),
            ("ip", node([("address", leaf())])),
            (
                "switchport",
                node([
                    ("mode", node([("access", leaf()), ("trunk", leaf())])),
                    ("access", node([("vlan", leaf())])),
                    (
                        "trunk",
                        node([
                            ("native", node([("vlan", leaf())])),
                            (
                                "allowed",
                                node([(
                                    "vlan",
                                    node([("add", leaf()), ("remove", leaf())]),
                                )]),
                            ),
                        ]),
                    ),
                ]),
            ),
            (
                "spanning-tree",
                node([
                    ("portfast", leaf()),
                    ("bpduguard", node([("enable", leaf())])),
                ]),
            ),
            ("channel-group", leaf()),
            ("exit", leaf()),
        ]),
    );
    trees.insert(
        CliMode::ConfigSubIf,
        node([
            ("shutdown", leaf()),
            ("description", leaf()),
            ("encapsulation", node([("dot1q", leaf())])),
            ("ip", node([("address", leaf())])),
            ("exit", leaf()),
        ]),
    );
    trees.insert(
        CliMode::ConfigRouter,
        node([("network", leaf()), ("exit", leaf())]),
    );
    trees.insert(
        CliMode::ConfigStdNacl,
        node([("permit", leaf()), ("deny", leaf()), ("exit", leaf())]),
    );
    trees.insert(
        CliMode::ConfigRouterBgp,
        node([("neighbor", leaf()), ("exit", leaf())]),
    );
    trees
}

/// Outcome of a completion attempt against one mode's trie.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion {
    /// No keyword matches; leave input alone.
    None,
    /// Replace the whole input line with this text.
    Extend(String),
    /// Several keywords match with no further common prefix.
    Candidates(Vec<&'static str>),
}

/// Completes the last (possibly empty) token of `input` against the trie.
///
/// A unique match appends a trailing space; multiple matches extend input
/// to the longest common literal prefix when that gains characters, and
/// otherwise just report the candidates.
pub fn complete(tree: &CommandTree, input: &str) -> Completion {
    let mut tokens: Vec<&str> = input.split_whitespace().collect();
    let word = if input.is_empty() || input.ends_with(char::is_whitespace) {
        ""
    } else {
        tokens.pop().unwrap_or("")
    };

    let mut current = tree;
    for token in &tokens {
        match current.children.get(token) {
            Some(next) => current = next,
            None => return Completion::None,
        }
    }

    let matches: Vec<&'static str> = current
        .children
        .keys()
        .copied()
        .filter(|key| key.starts_with(word))
        .collect();

    match matches.len() {
        0 => Completion::None,
        1 => {
            let mut completed: Vec<&str> = tokens.clone();
            completed.push(matches[0]);
            Completion::Extend(format!("{} ", completed.join(" ")))
        }
        _ => {
            let prefix = longest_common_prefix(&matches);
            if prefix.len() > word.len() {
                let mut completed: Vec<&str> = tokens.clone();
                completed.push(prefix);
                Completion::Extend(completed.join(" "))
            } else {
                Completion::Candidates(matches)
            }
        }
    }
}

fn longest_common_prefix<'a>(values: &[&'a str]) -> &'a str {
    let Some(first) = values.first() else {
        return "";
    };
    let mut len = first.len();
    for value in &values[1..] {
        len = first
            .bytes()
            .take(len)
            .zip(value.bytes())
            .take_while(|(a, b)| a == b)
            .count();
    }
    &first[..len]
}
