use crate::vector::ProfileVector;

use super::core::EngineError;

/// Fold replacement columns into real machine configurations.
///
/// A configuration that still owes a job (a negative entry) is added into
/// the first other configuration holding a surplus in that bucket, and is
/// then cleared. The column sum is preserved. Zero vectors are removed
/// at the end.
pub fn remove_replacement_columns(configs: &mut Vec<ProfileVector>) -> Result<(), EngineError> {
    loop {
        let Some((debtor, bucket)) = configs
            .iter()
            .enumerate()
            .find_map(|(pos, config)| config.first_negative().map(|bucket| (pos, bucket)))
        else {
            break;
        };
        let Some(creditor) = configs
            .iter()
            .enumerate()
            .position(|(pos, config)| pos != debtor && config[bucket] > 0)
        else {
            return Err(EngineError::UnresolvedDebit {
                bucket,
                vector: configs[debtor].clone(),
            });
        };

        let dim = configs[debtor].dim();
        let debit = std::mem::replace(&mut configs[debtor], ProfileVector::zeros(dim));
        configs[creditor] += &debit;
    }
    configs.retain(|config| !config.is_zero());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::sum_vectors;

    fn pv(values: &[i32]) -> ProfileVector {
        ProfileVector::from_slice(values)
    }

    #[test]
    fn test_clean_input_only_drops_zeros() {
        let mut configs = vec![pv(&[1, 0, 0]), pv(&[0, 0, 0]), pv(&[0, 1, 1])];
        remove_replacement_columns(&mut configs).unwrap();
        assert_eq!(configs, vec![pv(&[1, 0, 0]), pv(&[0, 1, 1])]);
    }

    #[test]
    fn test_debit_is_absorbed() {
        let mut configs = vec![pv(&[1, 1, 0]), pv(&[-1, 2, 0]), pv(&[0, 0, 1])];
        remove_replacement_columns(&mut configs).unwrap();
        assert_eq!(configs, vec![pv(&[0, 3, 0]), pv(&[0, 0, 1])]);
    }

    #[test]
    fn test_single_debit_merges_into_creditor() {
        let mut configs = vec![pv(&[-1, 0, 2]), pv(&[1, 0, 0])];
        remove_replacement_columns(&mut configs).unwrap();
        assert_eq!(configs, vec![pv(&[0, 0, 2])]);
    }

    #[test]
    fn test_chained_debits() {
        let mut configs = vec![
            pv(&[-1, 2, 0]),
            pv(&[0, -1, 2]),
            pv(&[1, 0, 0]),
            pv(&[1, 1, 1]),
        ];
        let total = sum_vectors(3, &configs);
        remove_replacement_columns(&mut configs).unwrap();
        assert_eq!(sum_vectors(3, &configs), total);
        assert!(configs.iter().all(|c| c.is_non_negative() && !c.is_zero()));
    }

    #[test]
    fn test_unresolved_debit() {
        let mut configs = vec![pv(&[-1, 2]), pv(&[0, 1])];
        let err = remove_replacement_columns(&mut configs).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedDebit { bucket: 0, .. }));
    }
}
