//! Browser Tests
//!
//! Data access layer against the in-process fake server.

#[path = "../common/mod.rs"]
mod common;

use common::{Entry, FakeServer};
use keyscope::browser::{prefix_pattern, KeyScan};
use keyscope::{Browser, Client, KeyscopeError, NodeRef, Value};
use tracing::Span;

fn user_server() -> FakeServer {
    let server = FakeServer::start();
    for key in ["user:1:name", "user:1:age", "user:2:name"] {
        server.set(0, key, "x");
    }
    server
}

fn connected(server: &FakeServer) -> Browser {
    let mut browser = Browser::new(server.config());
    browser.connect().unwrap();
    browser
}

fn node_at(browser: &Browser, db: usize, key: &str) -> NodeRef {
    let id = browser
        .tree(db)
        .and_then(|tree| tree.lookup(key))
        .unwrap_or_else(|| panic!("no node for {:?}", key));
    NodeRef { db, id }
}

fn names(browser: &Browser, nodes: &[NodeRef]) -> Vec<String> {
    nodes
        .iter()
        .map(|&node| browser.node(node).unwrap().name().to_string())
        .collect()
}

fn scans_from_zero(server: &FakeServer) -> usize {
    server
        .commands()
        .iter()
        .filter(|args| args[0] == "SCAN" && args[1] == "0")
        .count()
}

// =============================================================================
// Databases and Selection
// =============================================================================

#[test]
fn test_databases_are_allocated_once() {
    let server = FakeServer::with_databases(4);
    let mut browser = connected(&server);
    assert_eq!(browser.database_count(), 0);

    let roots = browser.databases().unwrap();
    assert_eq!(roots.len(), 4);
    assert_eq!(names(&browser, &roots), vec!["db0", "db1", "db2", "db3"]);

    browser.databases().unwrap();
    assert_eq!(server.count("CONFIG"), 1);
}

#[test]
fn test_refused_config_falls_back() {
    let server = FakeServer::with_databases(4);
    server.refuse_config();
    let mut browser = connected(&server);
    assert_eq!(browser.databases().unwrap().len(), 16);
}

#[test]
fn test_select_twice_sends_once() {
    let server = FakeServer::start();
    let mut browser = connected(&server);
    server.clear_log();

    browser.select(3).unwrap();
    browser.select(3).unwrap();
    assert_eq!(server.count("SELECT"), 1);
    assert_eq!(browser.current_db(), 3);

    browser.select(0).unwrap();
    assert_eq!(server.count("SELECT"), 2);
}

#[test]
fn test_select_out_of_range() {
    let server = FakeServer::with_databases(2);
    let mut browser = connected(&server);
    browser.databases().unwrap();
    server.clear_log();

    assert!(matches!(
        browser.select(5),
        Err(KeyscopeError::InvalidArgument(_))
    ));
    assert_eq!(server.count("SELECT"), 0);
    assert_eq!(browser.current_db(), 0);
}

// =============================================================================
// Scanning
// =============================================================================

#[test]
fn test_scan_all_keys_builds_tree() {
    let server = user_server();
    let mut browser = connected(&server);

    let top = browser.scan_all_keys().unwrap();
    assert_eq!(names(&browser, &top), vec!["user"]);
    assert!(server.count("SCAN") >= 2);

    let tree = browser.tree(0).unwrap();
    assert_eq!(tree.node(tree.root()).unwrap().count(), 3);
    let user = tree.lookup("user:").unwrap();
    assert_eq!(tree.node(user).unwrap().count(), 3);
    assert_eq!(tree.node(tree.lookup("user:1:").unwrap()).unwrap().count(), 2);
    assert!(tree.lookup("user:2:name").is_some());
}

#[test]
fn test_rescan_replaces_tree() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    server.remove(0, "user:2:name");
    server.set(0, "session:1", "x");
    let top = browser.scan_all_keys().unwrap();

    let mut top = names(&browser, &top);
    top.sort();
    assert_eq!(top, vec!["session", "user"]);
    let tree = browser.tree(0).unwrap();
    assert!(tree.lookup("user:2:").is_none());
    assert_eq!(tree.node(tree.lookup("user:").unwrap()).unwrap().count(), 2);
}

#[test]
fn test_scan_follows_selected_database() {
    let server = FakeServer::start();
    server.set(0, "zero", "x");
    server.set(2, "two:a", "x");
    let mut browser = connected(&server);
    browser.select(2).unwrap();

    let top = browser.scan_all_keys().unwrap();
    assert_eq!(names(&browser, &top), vec!["two"]);
    assert!(top.iter().all(|node| node.db == 2));
    assert!(browser.tree(0).unwrap().is_empty());
}

#[test]
fn test_scan_resumes_after_dropped_connection() {
    let server = FakeServer::start();
    for i in 1..=5 {
        server.set(0, &format!("k{}", i), "x");
    }
    let mut browser = connected(&server);
    server.drop_on_scan(2);

    let top = browser.scan_all_keys().unwrap();
    assert_eq!(top.len(), 5);
    assert_eq!(server.connections(), 2);
    // The retry picked up the interrupted cursor instead of starting over
    assert_eq!(scans_from_zero(&server), 1);

    let tree = browser.tree(0).unwrap();
    assert_eq!(tree.node(tree.root()).unwrap().count(), 5);
}

#[test]
fn test_key_scan_reports_resume_cursor() {
    let server = FakeServer::start();
    for i in 1..=5 {
        server.set(0, &format!("k{}", i), "x");
    }
    server.drop_on_scan(2);

    let mut scan = KeyScan::new("*", 2);
    let mut seen = Vec::new();
    let mut client = Client::connect(&server.config(), Span::none()).unwrap();
    let err = scan
        .run(&mut client, |key| seen.push(key.to_string()))
        .unwrap_err();

    match &err {
        KeyscopeError::ScanIncomplete { cursor, source } => {
            assert_eq!(cursor, "2");
            assert!(matches!(**source, KeyscopeError::Connection(_)));
        }
        other => panic!("expected ScanIncomplete, got {:?}", other),
    }
    assert!(err.is_retryable());
    assert_eq!(seen, vec!["k1", "k2"]);
    assert!(!scan.is_complete());

    let mut client = Client::connect(&server.config(), Span::none()).unwrap();
    let delivered = scan
        .run(&mut client, |key| seen.push(key.to_string()))
        .unwrap();
    assert_eq!(delivered, 3);
    assert_eq!(seen, vec!["k1", "k2", "k3", "k4", "k5"]);
    assert!(scan.is_complete());
    assert_eq!(scan.keys_seen(), 5);
}

#[test]
fn test_empty_database_scan() {
    let server = FakeServer::start();
    let mut browser = connected(&server);
    assert!(browser.scan_all_keys().unwrap().is_empty());
    assert!(browser.tree(0).unwrap().is_empty());
}

#[test]
fn test_legacy_keys_load() {
    let server = user_server();
    let mut browser = connected(&server);

    let top = browser.load_all_keys_legacy().unwrap();
    assert_eq!(names(&browser, &top), vec!["user"]);
    assert_eq!(server.count("KEYS"), 1);
    assert_eq!(server.count("SCAN"), 0);
}

#[test]
fn test_prefix_pattern_escapes_glob() {
    assert_eq!(prefix_pattern(""), "*");
    assert_eq!(prefix_pattern("user:"), "user:*");
    assert_eq!(prefix_pattern("a*b?[c]:"), "a\\*b\\?\\[c\\]:*");
}

// =============================================================================
// Reload
// =============================================================================

#[test]
fn test_reload_prefix_picks_up_new_keys() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    server.set(0, "user:3:name", "x");
    let user = node_at(&browser, 0, "user:");
    browser.reload(user).unwrap();

    let tree = browser.tree(0).unwrap();
    assert!(tree.lookup("user:3:name").is_some());
    assert_eq!(tree.node(user.id).unwrap().count(), 4);
    // Ancestors keep their counts
    assert_eq!(tree.node(tree.root()).unwrap().count(), 3);

    let scan = server
        .commands()
        .into_iter()
        .rev()
        .find(|args| args[0] == "SCAN")
        .unwrap();
    assert_eq!(scan[3], "user:*");
}

#[test]
fn test_reload_empty_prefix_prunes() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    server.remove(0, "user:2:name");
    let two = node_at(&browser, 0, "user:2:");
    browser.reload(two).unwrap();

    let tree = browser.tree(0).unwrap();
    assert!(tree.lookup("user:2:").is_none());
    assert!(tree.is_removed(two.id));
    assert!(tree.lookup("user:1:").is_some());
}

#[test]
fn test_reload_vanished_leaf() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    server.remove(0, "user:1:age");
    let age = node_at(&browser, 0, "user:1:age");
    browser.reload(age).unwrap();
    assert!(browser.node(age).is_none());
    assert!(browser.tree(0).unwrap().lookup("user:1:name").is_some());
}

#[test]
fn test_reload_existing_leaf_clears_tombstone() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let name = node_at(&browser, 0, "user:1:name");
    browser.delete(name).unwrap();
    assert!(browser.node(name).unwrap().is_removed());

    server.set(0, "user:1:name", "back");
    browser.reload(name).unwrap();
    assert!(!browser.node(name).unwrap().is_removed());
}

// =============================================================================
// Mutations
// =============================================================================

#[test]
fn test_delete_prefix_removes_all_descendants() {
    let server = user_server();
    server.set(0, "other", "x");
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let one = node_at(&browser, 0, "user:1:");
    let outcome = browser.delete(one).unwrap();
    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.issued, 3);
    assert!(!outcome.cancelled);

    assert_eq!(server.keys(0), vec!["other", "user:2:name"]);
    let tree = browser.tree(0).unwrap();
    assert!(tree.is_removed(one.id));
    for id in tree.descendants(one.id) {
        assert!(tree.is_removed(id));
    }
    assert!(!tree.is_removed(tree.lookup("user:2:name").unwrap()));
}

#[test]
fn test_delete_skips_tombstones() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let age = node_at(&browser, 0, "user:1:age");
    browser.delete(age).unwrap();
    server.clear_log();

    let one = node_at(&browser, 0, "user:1:");
    let outcome = browser.delete(one).unwrap();
    assert_eq!(outcome.issued, 2);
    assert!(server
        .commands()
        .iter()
        .all(|args| !(args[0] == "DEL" && args[1] == "user:1:age")));
}

#[test]
fn test_delete_root_rejected() {
    let server = user_server();
    let mut browser = connected(&server);
    let roots = browser.databases().unwrap();
    assert!(matches!(
        browser.delete(roots[0]),
        Err(KeyscopeError::InvalidArgument(_))
    ));
    assert_eq!(server.count("DEL"), 0);
}

#[test]
fn test_flush_db() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();
    let roots = browser.databases().unwrap();

    let user = node_at(&browser, 0, "user:");
    assert!(matches!(
        browser.flush_db(user),
        Err(KeyscopeError::InvalidArgument(_))
    ));

    browser.flush_db(roots[0]).unwrap();
    assert!(server.keys(0).is_empty());
    let tree = browser.tree(0).unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.node(tree.root()).unwrap().count(), 0);
    assert!(browser.node(user).is_none());
}

#[test]
fn test_rename_in_place() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let leaf = node_at(&browser, 0, "user:2:name");
    browser.rename(leaf, "user:2:title").unwrap();
    assert!(server.contains(0, "user:2:title"));
    assert!(!server.contains(0, "user:2:name"));

    let node = browser.node(leaf).unwrap();
    assert_eq!(node.key(), "user:2:title");
    assert_eq!(node.name(), "title");

    server.clear_log();
    browser.rename(leaf, "user:2:title").unwrap();
    assert_eq!(server.count("RENAME"), 0);
}

#[test]
fn test_rename_failure_leaves_tree() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let leaf = node_at(&browser, 0, "user:2:name");
    server.remove(0, "user:2:name");
    assert!(matches!(
        browser.rename(leaf, "user:2:x"),
        Err(KeyscopeError::Command(_))
    ));
    assert_eq!(browser.node(leaf).unwrap().key(), "user:2:name");
}

#[test]
fn test_rename_onto_existing_key() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let age = node_at(&browser, 0, "user:1:age");
    let name = node_at(&browser, 0, "user:1:name");
    browser.rename(age, "user:1:name").unwrap();

    assert!(browser.node(name).is_none());
    assert_eq!(node_at(&browser, 0, "user:1:name"), age);
    let one = node_at(&browser, 0, "user:1:");
    assert_eq!(browser.children(one), vec![age]);
}

#[test]
fn test_prefix_nodes_are_not_keys() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();
    server.clear_log();

    let one = node_at(&browser, 0, "user:1:");
    assert!(matches!(
        browser.set_value(one, "oops"),
        Err(KeyscopeError::InvalidArgument(_))
    ));
    assert!(matches!(
        browser.rename(one, "user:9:"),
        Err(KeyscopeError::InvalidArgument(_))
    ));

    assert!(!server.contains(0, "user:1:"));
    assert_eq!(server.count("SET"), 0);
    assert_eq!(server.count("RENAME"), 0);
    assert_eq!(browser.node(one).unwrap().key(), "user:1:");
}

#[test]
fn test_set_value() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let leaf = node_at(&browser, 0, "user:1:name");
    browser.set_value(leaf, "alice").unwrap();
    assert_eq!(
        browser.get_value("user:1:name").unwrap(),
        Some(Value::Text("alice".to_string()))
    );
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_get_value_by_type() {
    let server = FakeServer::start();
    server.set(0, "s", "hello");
    server.insert(0, "bin", Entry::Str(vec![0x00, 0x01, 0xff]));
    server.insert(0, "l", Entry::List(vec!["a".into(), "b".into()]));
    server.insert(0, "st", Entry::Set(vec!["m".into()]));
    server.insert(0, "h", Entry::Hash(vec![("f".into(), "v".into())]));
    server.insert(0, "z", Entry::Zset);
    let mut browser = connected(&server);

    assert_eq!(
        browser.get_value("s").unwrap(),
        Some(Value::Text("hello".to_string()))
    );
    assert_eq!(
        browser.get_value("bin").unwrap(),
        Some(Value::HexBlob("\\x00\\x01\\xFF".to_string()))
    );
    assert_eq!(
        browser.get_value("l").unwrap(),
        Some(Value::List(vec!["a".to_string(), "b".to_string()]))
    );
    assert_eq!(
        browser.get_value("st").unwrap(),
        Some(Value::Set(vec!["m".to_string()]))
    );
    assert_eq!(
        browser.get_value("h").unwrap(),
        Some(Value::Hash(vec![("f".to_string(), "v".to_string())]))
    );
    assert_eq!(
        browser.get_value("z").unwrap(),
        Some(Value::Unsupported("zset".to_string()))
    );
    assert_eq!(browser.get_value("missing").unwrap(), None);
}

#[test]
fn test_value_of_selects_database() {
    let server = FakeServer::start();
    server.set(1, "k:v", "one");
    let mut browser = connected(&server);
    browser.select(1).unwrap();
    browser.scan_all_keys().unwrap();
    browser.select(0).unwrap();

    let node = node_at(&browser, 1, "k:v");
    assert_eq!(
        browser.value_of(node).unwrap(),
        Some(Value::Text("one".to_string()))
    );
    assert_eq!(browser.current_db(), 1);
}

#[test]
fn test_value_of_tombstone_skips_server() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();

    let leaf = node_at(&browser, 0, "user:1:age");
    browser.delete(leaf).unwrap();
    server.clear_log();
    assert_eq!(browser.value_of(leaf).unwrap(), None);
    assert!(server.commands().is_empty());
}

// =============================================================================
// Retry Policy
// =============================================================================

#[test]
fn test_reads_reconnect_once() {
    let server = FakeServer::start();
    server.set(2, "k", "v");
    let mut browser = connected(&server);
    browser.select(2).unwrap();

    browser.close();
    assert!(!browser.is_connected());
    assert_eq!(
        browser.get_value("k").unwrap(),
        Some(Value::Text("v".to_string()))
    );
    assert!(browser.is_connected());
    assert_eq!(server.connections(), 2);
    // The new session went back to the database the old one had selected
    assert_eq!(browser.current_db(), 2);
}

#[test]
fn test_mutations_do_not_reconnect() {
    let server = user_server();
    let mut browser = connected(&server);
    browser.scan_all_keys().unwrap();
    let leaf = node_at(&browser, 0, "user:1:name");

    browser.close();
    assert!(matches!(
        browser.delete(leaf),
        Err(KeyscopeError::NotConnected)
    ));
    assert!(matches!(
        browser.rename(leaf, "user:1:x"),
        Err(KeyscopeError::NotConnected)
    ));
    assert!(matches!(
        browser.exec("PING"),
        Err(KeyscopeError::NotConnected)
    ));
    assert_eq!(server.connections(), 1);
    assert!(server.contains(0, "user:1:name"));
}

#[test]
fn test_lazy_first_connect() {
    let server = FakeServer::start();
    server.set(0, "k", "v");
    let mut browser = Browser::new(server.config());
    assert!(!browser.is_connected());
    assert!(browser.get_value("k").unwrap().is_some());
    assert_eq!(server.connections(), 1);
}

#[test]
fn test_first_read_reports_dial_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let config = keyscope::Config::builder().addr(&addr).build();
    let mut browser = Browser::new(config);
    assert!(browser.get_value("k").is_err());
    assert!(!browser.is_connected());
}

// =============================================================================
// Pass-through
// =============================================================================

#[test]
fn test_exec() {
    let server = FakeServer::start();
    let mut browser = connected(&server);

    assert!(browser.exec("SET greeting hi").unwrap().is_ok_status());
    assert_eq!(browser.exec("GET greeting").unwrap().to_string(), "\"hi\"");
    assert!(browser.exec("BOGUS").unwrap().is_error());
    assert!(matches!(
        browser.exec("   "),
        Err(KeyscopeError::InvalidArgument(_))
    ));

    browser.exec("select 4").unwrap();
    assert_eq!(browser.current_db(), 4);
}
