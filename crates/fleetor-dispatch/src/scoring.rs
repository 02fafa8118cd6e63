//! Priority scoring shared by the dispatcher and the task queues.

use fleetor_core::TaskPriority;

/// Scores a task for dispatch selection.
///
/// `((rank + 1) * 10 + age) * category_weight`, where age is in simulation
/// seconds. Orders use a weight of 1.0; restocks use the configured restock
/// weight (< 1.0). Higher scores win; ties are broken by the caller with the
/// lowest task id.
pub fn task_score(priority: TaskPriority, age: f64, category_weight: f64) -> f64 {
    ((f64::from(priority.rank()) + 1.0) * 10.0 + age) * category_weight
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_at_equal_age() {
        let age = 4.0;
        let low = task_score(TaskPriority::Low, age, 1.0);
        let normal = task_score(TaskPriority::Normal, age, 1.0);
        let high = task_score(TaskPriority::High, age, 1.0);
        let critical = task_score(TaskPriority::Critical, age, 1.0);
        assert!(critical > high);
        assert!(high > normal);
        assert!(normal > low);
    }

    #[test]
    fn test_age_increases_score() {
        assert!(
            task_score(TaskPriority::Normal, 10.0, 1.0)
                > task_score(TaskPriority::Normal, 0.0, 1.0)
        );
    }

    #[test]
    fn test_critical_order_beats_weighted_high_restock() {
        // Fresh critical order: (3 + 1) * 10 = 40.
        let order = task_score(TaskPriority::Critical, 0.0, 1.0);
        // Fresh high restock at weight 0.9: (2 + 1) * 10 * 0.9 = 27.
        let restock = task_score(TaskPriority::High, 0.0, 0.9);
        assert_eq!(order, 40.0);
        assert_eq!(restock, 27.0);
        assert!(order > restock);
    }
}
