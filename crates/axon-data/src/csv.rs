// CSV — comma-separated samples, one per line
//
// Each line holds the inputs followed by the targets. With one-hot encoding
// the target is a single class index in the last column, expanded into a
// (1, outputs) column; otherwise the last `outputs` columns are the targets.
// Inputs become (1, n) columns. Blank lines are skipped.

use std::fs;
use std::path::Path;

use axon_core::{Error, Result, Tensor};

use crate::data::Data;

/// Load samples from a CSV file on disk.
pub fn load_csv(path: impl AsRef<Path>, outputs: usize, one_hot: bool) -> Result<Vec<Data>> {
    let content = fs::read_to_string(path.as_ref())?;
    let data = parse_csv(&content, outputs, one_hot)?;
    log::debug!(
        "loaded {} CSV samples from {}",
        data.len(),
        path.as_ref().display()
    );
    Ok(data)
}

/// Parse CSV text into samples.
pub fn parse_csv(content: &str, outputs: usize, one_hot: bool) -> Result<Vec<Data>> {
    if outputs == 0 {
        return Err(Error::config("CSV: outputs must be positive"));
    }
    let target_columns = if one_hot { 1 } else { outputs };

    let mut data = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let values = line
            .split(',')
            .map(|field| {
                field.trim().parse::<f32>().map_err(|e| {
                    Error::decode(format!("CSV line {}: bad value {field:?}: {e}", line_no + 1))
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        if values.len() <= target_columns {
            return Err(Error::decode(format!(
                "CSV line {}: expected more than {target_columns} columns, got {}",
                line_no + 1,
                values.len()
            )));
        }

        let split = values.len() - target_columns;
        let input = Tensor::column(values[..split].to_vec())?;
        let output = if one_hot {
            let class = values[split];
            if class < 0.0 || class.fract() != 0.0 || class as usize >= outputs {
                return Err(Error::decode(format!(
                    "CSV line {}: class {class} is not in 0..{outputs}",
                    line_no + 1
                )));
            }
            let mut t = Tensor::zeros((1, outputs));
            t.set(0, class as usize, 0, 0, 1.0);
            t
        } else {
            Tensor::column(values[split..].to_vec())?
        };
        data.push(Data::new(input, output)?);
    }
    Ok(data)
}
