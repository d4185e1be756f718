//! Helpers for colon-delimited hierarchical skill identifiers.
//!
//! `"Web:React:Hooks"` is a child of `"Web:React"`, which is a child of `"Web"`.

pub const SEPARATOR: char = ':';

/// Ancestors of `skill_id`, nearest first. The skill itself is not included.
pub fn ancestors(skill_id: &str) -> impl Iterator<Item = &str> {
    let mut current = skill_id;
    std::iter::from_fn(move || {
        let idx = current.rfind(SEPARATOR)?;
        current = &current[..idx];
        Some(current)
    })
}

/// Number of segments in the path.
pub fn depth(skill_id: &str) -> usize {
    if skill_id.is_empty() {
        0
    } else {
        skill_id.matches(SEPARATOR).count() + 1
    }
}

pub fn is_ancestor_of(ancestor: &str, skill_id: &str) -> bool {
    skill_id.len() > ancestor.len()
        && skill_id.starts_with(ancestor)
        && skill_id[ancestor.len()..].starts_with(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_up_one_segment_at_a_time() {
        let walked: Vec<_> = ancestors("Web:React:Hooks").collect();
        assert_eq!(walked, vec!["Web:React", "Web"]);
        assert_eq!(ancestors("Web").count(), 0);
    }

    #[test]
    fn depth_counts_segments() {
        assert_eq!(depth(""), 0);
        assert_eq!(depth("Web"), 1);
        assert_eq!(depth("Web:React:Hooks"), 3);
    }

    #[test]
    fn ancestry_respects_segment_boundaries() {
        assert!(is_ancestor_of("Web", "Web:React"));
        assert!(!is_ancestor_of("We", "Web:React"));
        assert!(!is_ancestor_of("Web:React", "Web:React"));
    }
}
