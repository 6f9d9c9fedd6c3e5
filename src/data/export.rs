use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, Float64Builder, Int64Array, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

// ---------------------------------------------------------------------------
// VoxelRecord – one exported row
// ---------------------------------------------------------------------------

/// One voxel's spectrum plus its per-voxel results.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelRecord {
    /// Spatial coordinates, `(row, col[, slice])`.
    pub coords: Vec<usize>,
    /// Intensity per frequency bin.
    pub spectrum: Vec<f64>,
    pub asymmetry: Option<f64>,
    pub shift: Option<i64>,
}

/// Zip matrix rows with their voxel coordinates and optional results.
pub fn voxel_records(
    matrix: &Array2<f64>,
    coords: &[Vec<usize>],
    asymmetry: Option<&[f64]>,
    shifts: Option<&[i64]>,
) -> Result<Vec<VoxelRecord>> {
    let n = matrix.nrows();
    if coords.len() != n
        || asymmetry.is_some_and(|a| a.len() != n)
        || shifts.is_some_and(|s| s.len() != n)
    {
        bail!("voxel results disagree on the number of voxels (matrix has {n} rows)");
    }

    Ok(matrix
        .outer_iter()
        .enumerate()
        .map(|(i, row)| VoxelRecord {
            coords: coords[i].clone(),
            spectrum: row.to_vec(),
            asymmetry: asymmetry.map(|a| a[i]),
            shift: shifts.map(|s| s[i]),
        })
        .collect())
}

impl VoxelRecord {
    /// Asymmetry when it is defined; NaN and missing both export as null.
    pub fn defined_asymmetry(&self) -> Option<f64> {
        self.asymmetry.filter(|a| a.is_finite())
    }
}

fn coord_name(axis: usize) -> String {
    match axis {
        0 => "row".to_string(),
        1 => "col".to_string(),
        2 => "slice".to_string(),
        n => format!("axis{n}"),
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write voxel records to a table file.  Dispatch by extension.
///
/// Every format carries `x` (bin index) and `y` (intensity) per row, then
/// the coordinate columns, `asymmetry` and `shift`. Undefined asymmetry is
/// null in every format (an empty CSV field):
/// * `.parquet` – `x`/`y` as List<Float64> columns
/// * `.json`    – `[{ "x": [...], "y": [...], "row": 0, ... }, ...]`
/// * `.csv`     – `x`/`y` as semicolon-separated floats
pub fn export_table(path: &Path, records: &[VoxelRecord]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => export_parquet(path, records),
        "json" => export_json(path, records),
        "csv" => export_csv(path, records),
        other => bail!("Unsupported table extension: .{other}"),
    }?;
    log::info!("wrote {} voxel rows to {}", records.len(), path.display());
    Ok(())
}

fn n_coords(records: &[VoxelRecord]) -> usize {
    records.iter().map(|r| r.coords.len()).max().unwrap_or(0)
}

fn bin_axis(len: usize) -> impl Iterator<Item = f64> {
    (0..len).map(|i| i as f64)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn export_json(path: &Path, records: &[VoxelRecord]) -> Result<()> {
    let rows: Vec<JsonValue> = records
        .iter()
        .map(|rec| {
            let mut obj = Map::new();
            obj.insert("x".into(), bin_axis(rec.spectrum.len()).collect());
            obj.insert("y".into(), rec.spectrum.iter().copied().collect());
            for (axis, &c) in rec.coords.iter().enumerate() {
                obj.insert(coord_name(axis), c.into());
            }
            obj.insert(
                "asymmetry".into(),
                rec.defined_asymmetry()
                    .map_or(JsonValue::Null, JsonValue::from),
            );
            obj.insert("shift".into(), rec.shift.map_or(JsonValue::Null, JsonValue::from));
            JsonValue::Object(obj)
        })
        .collect();

    let text = serde_json::to_string_pretty(&rows).context("serialising JSON")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn join_semicolon(values: impl Iterator<Item = f64>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}

fn export_csv(path: &Path, records: &[VoxelRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let dims = n_coords(records);

    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend((0..dims).map(coord_name));
    header.push("asymmetry".into());
    header.push("shift".into());
    writer.write_record(&header).context("writing CSV header")?;

    for (row_no, rec) in records.iter().enumerate() {
        let mut fields = vec![
            join_semicolon(bin_axis(rec.spectrum.len())),
            join_semicolon(rec.spectrum.iter().copied()),
        ];
        fields.extend((0..dims).map(|axis| {
            rec.coords
                .get(axis)
                .map(|c| c.to_string())
                .unwrap_or_default()
        }));
        fields.push(rec.defined_asymmetry().map(|a| a.to_string()).unwrap_or_default());
        fields.push(rec.shift.map(|s| s.to_string()).unwrap_or_default());
        writer
            .write_record(&fields)
            .with_context(|| format!("CSV row {row_no}"))?;
    }

    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn list_column(rows: impl Iterator<Item = Vec<f64>>) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn export_parquet(path: &Path, records: &[VoxelRecord]) -> Result<()> {
    let dims = n_coords(records);
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));

    let mut fields = vec![
        Field::new("x", list_type.clone(), false),
        Field::new("y", list_type, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        list_column(records.iter().map(|r| bin_axis(r.spectrum.len()).collect())),
        list_column(records.iter().map(|r| r.spectrum.clone())),
    ];

    for axis in 0..dims {
        fields.push(Field::new(coord_name(axis), DataType::Int64, true));
        let values: Vec<Option<i64>> = records
            .iter()
            .map(|r| r.coords.get(axis).map(|&c| c as i64))
            .collect();
        columns.push(Arc::new(Int64Array::from(values)));
    }

    fields.push(Field::new("asymmetry", DataType::Float64, true));
    columns.push(Arc::new(Float64Array::from(
        records.iter().map(|r| r.defined_asymmetry()).collect::<Vec<_>>(),
    )));
    fields.push(Field::new("shift", DataType::Int64, true));
    columns.push(Arc::new(Int64Array::from(
        records.iter().map(|r| r.shift).collect::<Vec<_>>(),
    )));

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
