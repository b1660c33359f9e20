use super::model::TargetData;

// ---------------------------------------------------------------------------
// Quality-flag predicate
// ---------------------------------------------------------------------------

/// Quality value of a cadence with no known data issue.
pub const GOOD_QUALITY: i32 = 0;

/// `true` for every cadence whose quality flag is [`GOOD_QUALITY`].
pub fn good_quality_mask(quality: &[i32]) -> Vec<bool> {
    quality.iter().map(|&q| q == GOOD_QUALITY).collect()
}

/// Keep the values whose mask entry is `true`, in their original order.
pub fn apply_mask<T: Copy>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(&v, _)| v)
        .collect()
}

/// The good-quality subset of a [`TargetData`] time series.
#[derive(Debug, Clone, PartialEq)]
pub struct GoodCadences {
    pub time: Vec<f64>,
    pub raw_flux: Vec<f64>,
    pub corr_flux: Vec<f64>,
    pub pca_flux: Vec<f64>,
    pub psf_flux: Vec<f64>,
}

impl GoodCadences {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

impl TargetData {
    /// Select the cadences flagged as good. The record itself is untouched.
    pub fn good_cadences(&self) -> GoodCadences {
        let mask = good_quality_mask(&self.quality);
        GoodCadences {
            time: apply_mask(&self.time, &mask),
            raw_flux: apply_mask(&self.raw_flux, &mask),
            corr_flux: apply_mask(&self.corr_flux, &mask),
            pca_flux: apply_mask(&self.pca_flux, &mask),
            psf_flux: apply_mask(&self.psf_flux, &mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::fixtures::target_data;

    #[test]
    fn test_mask_marks_only_zero_flags() {
        assert_eq!(
            good_quality_mask(&[0, 1, 0, 128, 0, -1]),
            vec![true, false, true, false, true, false]
        );
    }

    #[test]
    fn test_apply_mask_preserves_order() {
        let values = [5.0, 4.0, 3.0, 2.0, 1.0];
        let mask = [true, false, true, true, false];
        assert_eq!(apply_mask(&values, &mask), vec![5.0, 3.0, 2.0]);
    }

    #[test]
    fn test_good_cadences_length_equals_zero_flag_count() {
        let data = target_data(10);
        let zero_flags = data.quality.iter().filter(|&&q| q == 0).count();
        let good = data.good_cadences();

        assert_eq!(good.len(), zero_flags);
        assert_eq!(good.raw_flux.len(), zero_flags);
        assert_eq!(good.psf_flux.len(), zero_flags);
        assert!(good.time.windows(2).all(|w| w[0] < w[1]));
        // Cadences 3 and 7 are flagged in the fixture.
        assert_eq!(good.corr_flux, vec![2000.0, 2001.0, 2002.0, 2004.0, 2005.0, 2006.0, 2008.0, 2009.0]);
        assert_eq!(data.len(), 10);
    }

    #[test]
    fn test_all_flagged_gives_empty_selection() {
        let mut data = target_data(3);
        data.quality = vec![1, 2, 4];
        assert!(data.good_cadences().is_empty());
    }
}
