use anyhow::{Context, Result, bail};
use std::{fmt::Debug, ops::RangeBounds};

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

/// Check the length of a vector and, optionally, that every element is a probability.
pub fn check_vec(vec: &[f64], exp_len: usize, prob_vec: bool) -> Result<()> {
    let len = vec.len();
    if len != exp_len {
        bail!("vector length must be {exp_len}, but is {len}");
    }
    if vec.iter().any(|ele| !ele.is_finite()) {
        bail!("vector must have only finite elements");
    }
    if !prob_vec {
        return Ok(());
    }
    for (idx, &ele) in vec.iter().enumerate() {
        check_num(ele, 0.0..=1.0).with_context(|| format!("invalid element {idx}"))?;
    }
    Ok(())
}

/// Check the shape of a `[n_dst][n_step][n_fac]` tensor whose values must lie in `[0, 1]`.
pub fn check_tensor(tensor: &[Vec<Vec<f64>>], exp_dim: (usize, usize, usize)) -> Result<()> {
    let (exp_n_dst, exp_n_step, exp_n_fac) = exp_dim;
    let n_dst = tensor.len();
    if n_dst != exp_n_dst {
        bail!("tensor must have {exp_n_dst} destinations, but has {n_dst}");
    }
    for (i_dst, mat) in tensor.iter().enumerate() {
        let n_step = mat.len();
        if n_step != exp_n_step {
            bail!("destination {i_dst} must have {exp_n_step} steps, but has {n_step}");
        }
        for (i_step, row) in mat.iter().enumerate() {
            check_vec(row, exp_n_fac, true)
                .with_context(|| format!("invalid state of destination {i_dst} at step {i_step}"))?;
        }
    }
    Ok(())
}
