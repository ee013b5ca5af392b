//! Quantile classification of a numeric column.

/// Class breakpoints and the class assigned to each input value.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// One class index per input value, in input order.
    pub classes: Vec<usize>,
    /// `num_classes + 1` non-decreasing quantile boundaries.
    pub breaks: Vec<f64>,
}

impl Classification {
    pub fn num_classes(&self) -> usize {
        self.breaks.len().saturating_sub(1)
    }
}

/// Splits `values` into equal-probability classes.
///
/// The class count is clamped to `1..=distinct values`. Intervals are closed
/// on the right and the first one is also closed on the left, so a value
/// equal to an inner boundary falls into the class it bounds from above and
/// the minimum always lands in class 0.
pub fn classify(values: &[f64], num_classes: usize) -> Classification {
    if values.is_empty() {
        return Classification { classes: Vec::new(), breaks: Vec::new() };
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();
    let num_classes = num_classes.clamp(1, distinct.len());

    let breaks: Vec<f64> = (0..=num_classes)
        .map(|i| quantile(&sorted, i as f64 / num_classes as f64))
        .collect();

    let classes = values
        .iter()
        .map(|value| {
            breaks[1..]
                .partition_point(|upper| upper < value)
                .min(num_classes - 1)
        })
        .collect();

    Classification { classes, breaks }
}

/// Linear interpolation between the closest ranks of a sorted slice.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(values: &[f64], requested: usize) {
        let result = classify(values, requested);
        let mut distinct = values.to_vec();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        let expected = requested.clamp(1, distinct.len());

        assert_eq!(result.classes.len(), values.len());
        assert_eq!(result.breaks.len(), expected + 1);
        assert!(result.breaks.windows(2).all(|w| w[0] <= w[1]), "{:?}", result.breaks);
        assert!(result.classes.iter().all(|c| *c < expected), "{:?}", result.classes);
    }

    #[test]
    fn output_shape_holds_for_assorted_inputs() {
        let inputs: &[&[f64]] = &[
            &[1.0],
            &[3.0, 1.0, 2.0],
            &[0.0, 0.0, 1.0, 1.0, 1.0, 2.0],
            &[12.5, 80.1, 44.0, 44.0, 97.3, 3.2, 61.8, 29.9, 70.0, 55.5],
            &[100.0, 0.0],
        ];
        for values in inputs {
            for requested in [1, 2, 3, 5, 7, 12] {
                assert_well_formed(values, requested);
            }
        }
    }

    #[test]
    fn equal_values_collapse_into_class_zero() {
        let result = classify(&[5.0, 5.0, 5.0, 5.0], 3);
        assert_eq!(result.classes, vec![0, 0, 0, 0]);
        assert_eq!(result.breaks, vec![5.0, 5.0]);
    }

    #[test]
    fn quintiles_of_ten_values() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let result = classify(&values, 5);

        let expected_breaks = [1.0, 2.8, 4.6, 6.4, 8.2, 10.0];
        for (got, want) in result.breaks.iter().zip(expected_breaks) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert_eq!(result.classes, vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn boundary_values_belong_to_the_lower_class() {
        // breaks: 0, 50, 100
        let result = classify(&[0.0, 50.0, 100.0], 2);
        assert_eq!(result.breaks, vec![0.0, 50.0, 100.0]);
        assert_eq!(result.classes, vec![0, 0, 1]);
    }

    #[test]
    fn class_count_is_clamped_to_distinct_values() {
        let result = classify(&[1.0, 1.0, 2.0], 5);
        assert_eq!(result.num_classes(), 2);
        assert_eq!(result.classes, vec![0, 0, 1]);
    }

    #[test]
    fn zero_classes_means_one() {
        let result = classify(&[1.0, 2.0], 0);
        assert_eq!(result.num_classes(), 1);
        assert_eq!(result.classes, vec![0, 0]);
    }

    #[test]
    fn empty_input_yields_empty_classification() {
        let result = classify(&[], 4);
        assert!(result.classes.is_empty());
        assert!(result.breaks.is_empty());
        assert_eq!(result.num_classes(), 0);
    }
}
