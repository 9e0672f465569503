use crate::domain::mailbox::MailboxRef;

/// Order mailboxes deepest first so every child is deleted before its
/// parent. The sort is stable: equal depths keep their input order.
pub fn deepest_first<T: AsRef<MailboxRef>>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by(|a, b| b.as_ref().depth().cmp(&a.as_ref().depth()));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn refs(names: &[&str]) -> Vec<MailboxRef> {
        names.iter().map(|n| MailboxRef::new(*n, Some("/"))).collect()
    }

    fn names(v: &[MailboxRef]) -> Vec<&str> {
        v.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn children_before_parents() {
        let sorted = deepest_first(refs(&["INBOX", "INBOX/Work", "INBOX/Work/2024"]));
        assert_eq!(names(&sorted), vec!["INBOX/Work/2024", "INBOX/Work", "INBOX"]);
    }

    #[test]
    fn equal_depth_keeps_input_order() {
        let sorted = deepest_first(refs(&["A", "A/x", "B", "A/y", "B/z"]));
        assert_eq!(names(&sorted), vec!["A/x", "A/y", "B/z", "A", "B"]);
    }

    #[test]
    fn uses_each_mailbox_delimiter() {
        let sorted = deepest_first(vec![
            MailboxRef::new("INBOX", Some(".")),
            MailboxRef::new("INBOX.a.b", Some(".")),
            MailboxRef::new("INBOX.a", Some(".")),
        ]);
        assert_eq!(names(&sorted), vec!["INBOX.a.b", "INBOX.a", "INBOX"]);
    }

    proptest! {
        #[test]
        fn descendants_precede_ancestors(
            paths in prop::collection::vec(prop::collection::vec(0u8..3, 1..5), 1..20)
        ) {
            let mut names: Vec<String> = paths
                .iter()
                .map(|p| p.iter().map(|s| format!("f{}", s)).collect::<Vec<_>>().join("/"))
                .collect();
            names.sort();
            names.dedup();
            let sorted = deepest_first(
                names.iter().map(|n| MailboxRef::new(n.as_str(), Some("/"))).collect::<Vec<_>>(),
            );

            for (i, a) in sorted.iter().enumerate() {
                let child_prefix = format!("{}/", a.name);
                for b in &sorted[i + 1..] {
                    // nothing after `a` may be a descendant of `a`
                    prop_assert!(!b.name.starts_with(&child_prefix), "{} after {}", b.name, a.name);
                }
            }
        }
    }
}
