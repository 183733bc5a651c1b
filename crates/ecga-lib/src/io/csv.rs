use crate::table::RenderedTable;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::path::Path;

/// Write a rendered table as CSV, `Lead` column first. Sequence cells keep
/// their summary text.
pub fn write_table_csv(path: &Path, table: &RenderedTable) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(table.header())?;
    for row in &table.rows {
        writer.write_record(
            std::iter::once(row.lead.as_str()).chain(row.cells.iter().map(|c| c.text.as_str())),
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::LeadMap;
    use crate::table::render_predictions_table;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let mut preds: LeadMap<LeadMap<u64>> = LeadMap::new();
        preds.insert("L1", [("N", 5u64)].into_iter().collect());
        preds.insert("L2", [("PVC", 2u64), ("N", 1)].into_iter().collect());
        write_table_csv(&path, &render_predictions_table(&preds)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Lead,N,PVC\nL1,5,0\nL2,1,2\n");
    }
}
