use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use super::model::TargetData;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write the per-cadence table of `data` (all cadences, including flagged
/// ones). Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one column per series
/// * `.csv`     – header row plus one row per cadence
pub fn export_table(data: &TargetData, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => export_parquet(data, path),
        "csv" => export_csv(data, path),
        other => bail!("Unsupported export extension: .{other}"),
    }
}

/// Column names shared by both formats, in output order.
const FLUX_COLUMNS: [&str; 6] = [
    "raw_flux",
    "corr_flux",
    "pca_flux",
    "psf_flux",
    "flux_bkg",
    "tpf_flux_bkg",
];

fn flux_series(data: &TargetData) -> [&[f64]; 6] {
    [
        &data.raw_flux,
        &data.corr_flux,
        &data.pca_flux,
        &data.psf_flux,
        &data.flux_bkg,
        &data.tpf_flux_bkg,
    ]
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn export_parquet(data: &TargetData, path: &Path) -> Result<()> {
    let mut fields = vec![
        Field::new("time", DataType::Float64, false),
        Field::new("quality", DataType::Int32, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(data.time.clone())),
        Arc::new(Int32Array::from(data.quality.clone())),
    ];
    for (name, values) in FLUX_COLUMNS.iter().zip(flux_series(data)) {
        fields.push(Field::new(*name, DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(values.to_vec())));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    log::info!("Exported {} cadences to {}", data.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn export_csv(data: &TargetData, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["time", "quality"];
    header.extend(FLUX_COLUMNS);
    writer.write_record(&header).context("writing CSV header")?;

    let series = flux_series(data);
    for (row, (time, quality)) in data.time.iter().zip(&data.quality).enumerate() {
        let mut record = vec![time.to_string(), quality.to_string()];
        record.extend(series.iter().map(|s| s[row].to_string()));
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;

    log::info!("Exported {} cadences to {}", data.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::fixtures::target_data;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    #[test]
    fn test_parquet_export_contains_every_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wasp100.parquet");
        let data = target_data(6);
        export_table(&data, &path).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 6);

        let batch = &batches[0];
        assert_eq!(batch.num_columns(), 8);
        let quality = batch
            .column_by_name("quality")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(quality.value(3), 128);
        let corr = batch
            .column_by_name("corr_flux")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(corr.len(), 6);
        assert_eq!(corr.value(5), 2005.0);
    }

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wasp100.csv");
        export_table(&target_data(4), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "time");
        assert_eq!(&headers[1], "quality");
        assert_eq!(&headers[3], "corr_flux");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[3][1], "128");
        assert_eq!(&rows[1][2], "1001");
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_table(&target_data(1), &dir.path().join("lc.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
