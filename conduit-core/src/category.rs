use serde::{Deserialize, Serialize};

/// Functional grouping of plugins that share an execution policy.
///
/// Unknown tags deserialize into `Category::Other`, which maps to the
/// conservative default policy in [`props_for_category`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Observability,
    Authentication,
    Authorization,
    RateLimiting,
    Validation,
    Content,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryProperties {
    pub mode: ExecutionMode,
    pub can_reject: bool,
    pub can_modify: bool,
}

/// Pipeline execution order. Identical for REQUEST and RESPONSE flows.
pub const ORDERED_CATEGORIES: &[Category] = &[
    Category::Observability,
    Category::Authentication,
    Category::Authorization,
    Category::RateLimiting,
    Category::Validation,
    Category::Content,
];

/// Safe default for unknown categories: serial, cannot reject, cannot modify.
const DEFAULT_PROPERTIES: CategoryProperties = CategoryProperties {
    mode: ExecutionMode::Serial,
    can_reject: false,
    can_modify: false,
};

pub fn props_for_category(category: &Category) -> CategoryProperties {
    match category {
        Category::Observability => CategoryProperties {
            mode: ExecutionMode::Parallel,
            can_reject: false,
            can_modify: false,
        },
        Category::Authentication => CategoryProperties {
            mode: ExecutionMode::Serial,
            can_reject: true,
            can_modify: false,
        },
        Category::Authorization => CategoryProperties {
            mode: ExecutionMode::Serial,
            can_reject: true,
            can_modify: false,
        },
        Category::RateLimiting => CategoryProperties {
            mode: ExecutionMode::Serial,
            can_reject: true,
            can_modify: false,
        },
        Category::Validation => CategoryProperties {
            mode: ExecutionMode::Serial,
            can_reject: true,
            can_modify: false,
        },
        Category::Content => CategoryProperties {
            mode: ExecutionMode::Serial,
            can_reject: true,
            can_modify: true,
        },
        Category::Other => DEFAULT_PROPERTIES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_categories_matches_fixed_order() {
        assert_eq!(
            ORDERED_CATEGORIES,
            &[
                Category::Observability,
                Category::Authentication,
                Category::Authorization,
                Category::RateLimiting,
                Category::Validation,
                Category::Content,
            ]
        );
    }

    #[test]
    fn unknown_category_gets_safe_default() {
        let props = props_for_category(&Category::Other);
        assert_eq!(props.mode, ExecutionMode::Serial);
        assert!(!props.can_reject);
        assert!(!props.can_modify);
    }

    #[test]
    fn only_content_can_modify() {
        for category in ORDERED_CATEGORIES {
            let props = props_for_category(category);
            if *category == Category::Content {
                assert!(props.can_modify);
            } else {
                assert!(!props.can_modify, "{category:?} must not be able to modify");
            }
        }
    }

    #[test]
    fn only_observability_is_parallel() {
        for category in ORDERED_CATEGORIES {
            let props = props_for_category(category);
            let expect_parallel = *category == Category::Observability;
            assert_eq!(props.mode == ExecutionMode::Parallel, expect_parallel);
        }
    }

    #[test]
    fn observability_cannot_reject() {
        assert!(!props_for_category(&Category::Observability).can_reject);
    }
}
