use ndarray::Array1;

/// Numerically stable softmax over a vector of raw scores.
pub(crate) fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    if logits.is_empty() {
        return Array1::zeros(0);
    }
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.mapv(|x| (x - max).exp());
    let sum = exps.sum();
    exps / sum
}

/// Index and value of the largest element; the first one wins ties.
pub(crate) fn argmax(values: &Array1<f32>) -> Option<(usize, f32)> {
    values.iter()
        .cloned()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}
