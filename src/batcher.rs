/// Splits `parameters` into consecutive groups of at most `batch_size`.
///
/// A `batch_size` of zero puts everything into a single batch.
pub fn create_batches(parameters: &[String], batch_size: usize) -> Vec<Vec<String>> {
    if batch_size == 0 {
        return vec![parameters.to_vec()];
    }
    parameters
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}
