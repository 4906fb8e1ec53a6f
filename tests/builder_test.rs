//! Tests for TreeStoreBuilder: labels, cardinality, whitelist and unwinding

use rstest::{fixture, rstest};

use treestore::attrs;
use treestore::domain::{DomainError, Entry, Mapping, Schema, TreeStoreBuilder};
use treestore::util::testing;

#[fixture]
fn document_schema() -> Schema {
    testing::init_test_setup();
    Schema::new()
        .constrain("document", [("title", "1"), ("body", "1"), ("section", "0:3")])
        .unwrap()
        .valid_children("list", ["item"])
        .constrain("box", [("item", "0:2")])
        .unwrap()
}

// ============================================================
// End to end
// ============================================================

#[test]
fn given_user_branch_with_contact_leaf_when_finishing_then_mapping_matches() {
    // Arrange
    let mut builder = TreeStoreBuilder::new();

    // Act
    builder
        .open_branch("user", Some("alice"), attrs! {})
        .unwrap()
        .leaf("email", "a@x.com", Some("contact"), attrs! {})
        .unwrap()
        .close_branch()
        .unwrap();
    let tree = builder.finish().unwrap();

    // Assert
    let mut alice = Mapping::new();
    alice.insert("contact".into(), Entry::from("a@x.com"));
    let mut expected = Mapping::new();
    expected.insert("alice".into(), Entry::Map(alice));
    assert_eq!(tree.as_mapping(), expected);
}

#[test]
fn given_no_scopes_open_when_finishing_then_returns_empty_root() {
    let tree = TreeStoreBuilder::new().finish().unwrap();
    assert!(tree.root().is_empty());
    assert_eq!(tree.node_count(), 0);
}

// ============================================================
// Labels
// ============================================================

#[test]
fn given_repeated_unnamed_calls_when_adding_then_labels_are_distinct_in_order() {
    let mut builder = TreeStoreBuilder::new();
    for i in 0..3 {
        builder.leaf("item", i, None, attrs! {}).unwrap();
    }
    builder.open_branch("item", None, attrs! {}).unwrap();
    builder.close_branch().unwrap();

    let labels: Vec<&str> = builder.tree().root().labels().collect();
    assert_eq!(labels, vec!["item_0", "item_1", "item_2", "item_3"]);
}

#[test]
fn given_different_tags_when_adding_unnamed_then_each_tag_counts_separately() {
    let mut builder = TreeStoreBuilder::new();
    builder
        .leaf("a", 1, None, attrs! {})
        .unwrap()
        .leaf("b", 1, None, attrs! {})
        .unwrap()
        .leaf("a", 2, None, attrs! {})
        .unwrap();

    let labels: Vec<&str> = builder.tree().root().labels().collect();
    assert_eq!(labels, vec!["a_0", "b_0", "a_1"]);
}

#[test]
fn given_explicit_duplicate_name_when_adding_then_overwrites() {
    let mut builder = TreeStoreBuilder::new();
    builder.leaf("x", 1, Some("dup"), attrs! {}).unwrap();
    builder.leaf("x", 2, Some("dup"), attrs! {}).unwrap();

    let tree = builder.finish().unwrap();
    assert_eq!(tree.root().len(), 1);
    assert_eq!(tree.as_mapping().get("dup"), Some(&Entry::from(2)));
}

#[test]
fn given_attributes_when_opening_branch_then_stored_on_node() {
    let mut builder = TreeStoreBuilder::new();
    builder
        .open_branch("div", Some("main"), attrs! { "class" => "container", "id" => 7 })
        .unwrap();

    let node = builder.tree().root().get("main").unwrap();
    assert_eq!(node.attributes().len(), 2);
    assert_eq!(
        node.attributes().get("class").and_then(|v| v.as_str()),
        Some("container")
    );
}

// ============================================================
// Cardinality
// ============================================================

#[rstest]
fn given_title_only_when_closing_document_then_missing_body(document_schema: Schema) {
    // Arrange
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("document", None, attrs! {}).unwrap();
    builder.leaf("title", "Hello", None, attrs! {}).unwrap();

    // Act
    let result = builder.close_branch().map(|_| ());

    // Assert
    assert_eq!(
        result,
        Err(DomainError::MissingMandatoryChild {
            tag: "body".into(),
            scope: "document".into(),
            required: 1,
            found: 0,
        })
    );
    assert_eq!(builder.depth(), 1, "failed close keeps the scope open");
}

#[rstest]
fn given_box_with_max_two_when_adding_third_item_then_too_many_and_two_kept(
    document_schema: Schema,
) {
    // Arrange
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("box", None, attrs! {}).unwrap();
    builder.leaf("item", 1, None, attrs! {}).unwrap();
    builder.leaf("item", 2, None, attrs! {}).unwrap();

    // Act
    let result = builder.leaf("item", 3, None, attrs! {}).map(|_| ());

    // Assert
    assert_eq!(
        result,
        Err(DomainError::TooManyChildren {
            tag: "item".into(),
            scope: "box".into(),
            max: 2,
            found: 2,
        })
    );
    let cursor = builder.tree().store(builder.cursor()).unwrap();
    assert_eq!(cursor.labels().collect::<Vec<_>>(), vec!["item_0", "item_1"]);
    assert_eq!(builder.child_count("item"), 2);
}

#[rstest]
fn given_scope_without_tag_in_rules_when_adding_then_invalid_child(document_schema: Schema) {
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("list", None, attrs! {}).unwrap();

    let result = builder.open_branch("table", None, attrs! {}).map(|_| ());

    assert!(matches!(
        result,
        Err(DomainError::InvalidChild { ref tag, ref scope, .. }) if tag == "table" && scope == "list"
    ));
    assert!(builder.tree().store(builder.cursor()).unwrap().is_empty());
}

#[rstest]
fn given_unconstrained_scope_when_adding_anything_then_accepted(document_schema: Schema) {
    let mut builder = TreeStoreBuilder::with_schema(document_schema);

    builder.open_branch("anything", None, attrs! {}).unwrap();
    for _ in 0..10 {
        builder.leaf("whatever", 1, None, attrs! {}).unwrap();
    }

    assert!(builder.finish().is_ok());
}

#[rstest]
fn given_open_document_without_body_when_finishing_then_missing_body(document_schema: Schema) {
    // Arrange
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("document", None, attrs! {}).unwrap();
    builder.open_branch("title", None, attrs! {}).unwrap();

    // Act
    let result = builder.finish().map(|_| ());

    // Assert
    assert!(matches!(
        result,
        Err(DomainError::MissingMandatoryChild { ref tag, required: 1, found: 0, .. }) if tag == "body"
    ));
}

#[rstest]
fn given_failed_finish_when_inspecting_then_partial_tree_kept_and_retry_succeeds(
    document_schema: Schema,
) {
    // Arrange
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("document", Some("doc"), attrs! {}).unwrap();
    builder.leaf("title", "Hello", None, attrs! {}).unwrap();

    // Act
    let first = builder.finish().map(|_| ());

    // Assert
    assert!(matches!(
        first,
        Err(DomainError::MissingMandatoryChild { ref tag, ref scope, .. }) if tag == "body" && scope == "document"
    ));
    assert_eq!(builder.current_tag(), Some("document"));
    let doc = builder.tree().root().get("doc").and_then(|n| n.branch()).unwrap();
    assert_eq!(doc.labels().collect::<Vec<_>>(), vec!["title_0"]);

    builder.leaf("body", "text", None, attrs! {}).unwrap();
    let tree = builder.finish().unwrap();

    let doc = tree.root().get("doc").and_then(|n| n.branch()).unwrap();
    assert_eq!(doc.labels().collect::<Vec<_>>(), vec!["title_0", "body_0"]);
    assert_eq!(builder.depth(), 0);
    assert!(builder.tree().root().is_empty(), "builder starts over after handing out the tree");
}

#[rstest]
fn given_nested_unclosed_scopes_when_unwinding_then_each_level_checked(document_schema: Schema) {
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("document", None, attrs! {}).unwrap();
    builder.leaf("title", "t", None, attrs! {}).unwrap();
    builder.leaf("body", "b", None, attrs! {}).unwrap();
    builder.open_branch("section", None, attrs! {}).unwrap();
    builder.open_branch("box", None, attrs! {}).unwrap();

    builder.unwind().unwrap();

    assert_eq!(builder.depth(), 0);
    assert_eq!(builder.current_tag(), None);
}

#[rstest]
fn given_failed_leaf_when_continuing_then_session_stays_usable(document_schema: Schema) {
    let mut builder = TreeStoreBuilder::with_schema(document_schema);
    builder.open_branch("document", None, attrs! {}).unwrap();
    builder.leaf("title", "t", None, attrs! {}).unwrap();
    assert!(builder.leaf("title", "again", None, attrs! {}).is_err());

    builder.leaf("body", "b", None, attrs! {}).unwrap();
    let tree = builder.finish().unwrap();

    let doc = tree.as_mapping();
    let doc = doc.get("document_0").and_then(Entry::as_map).unwrap();
    assert_eq!(doc.get("title_0"), Some(&Entry::from("t")));
    assert_eq!(doc.len(), 2);
}

// ============================================================
// Whitelist
// ============================================================

#[test]
fn given_whitelist_when_opening_unlisted_tag_then_rejected_without_mutation() {
    // Arrange
    let schema = Schema::new().allow_tags(["div", "span", "p"]);
    let mut builder = TreeStoreBuilder::with_schema(schema);
    builder.open_branch("div", None, attrs! {}).unwrap();
    let before = builder.tree().as_mapping();

    // Act
    let result = builder.open_branch("script", None, attrs! {}).map(|_| ());

    // Assert
    assert_eq!(result, Err(DomainError::TagNotAllowed("script".into())));
    assert_eq!(builder.tree().as_mapping(), before);
    assert_eq!(builder.current_tag(), Some("div"));
}

#[test]
fn given_whitelist_when_adding_unlisted_leaf_at_root_then_rejected() {
    let schema = Schema::new().allow_tags(["p"]);
    let mut builder = TreeStoreBuilder::with_schema(schema);

    let result = builder.leaf("script", "alert(1)", None, attrs! {}).map(|_| ());

    assert_eq!(result, Err(DomainError::TagNotAllowed("script".into())));
    assert!(builder.tree().root().is_empty());
}

// ============================================================
// Scope transitions
// ============================================================

#[test]
fn given_root_cursor_when_closing_then_invalid_transition() {
    let mut builder = TreeStoreBuilder::new();
    let result = builder.close_branch().map(|_| ());
    assert_eq!(result, Err(DomainError::InvalidScopeTransition));
}

#[test]
fn given_open_and_close_when_done_then_cursor_returns_to_parent_store() {
    let mut builder = TreeStoreBuilder::new();
    let root = builder.cursor();

    builder.open_branch("a", None, attrs! {}).unwrap();
    let a = builder.cursor();
    builder.open_branch("b", None, attrs! {}).unwrap();
    builder.close_branch().unwrap();
    assert_eq!(builder.cursor(), a);
    builder.close_branch().unwrap();

    assert_eq!(builder.cursor(), root);
}
