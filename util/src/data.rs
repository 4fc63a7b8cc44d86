//! Reading and writing the plain-text tables a run consumes and produces.
//!
//! Observation and parameter files are tab delimited, ensemble files are
//! space delimited. Every value is written with five decimals. Lines
//! starting with `#` are ignored on input.

use nd::{Array, ArrayView, Ix1, Ix2};

use std::fs;
use std::path::{Path, PathBuf};

use na_core::{Error, Parameters, Result, TrajectoryBuffer, TrajectoryView};

/// Time-ordered measurements: `values` row `i` was taken at `times[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
  pub times: Array<f64, Ix1>,
  pub values: Array<f64, Ix2>,
}

impl ObservationRecord {
  pub fn new(times: Array<f64, Ix1>, values: Array<f64, Ix2>) -> Result<ObservationRecord> {
    if times.len() != values.dim().0 {
      return Err(Error::mismatch("observation timestamps", values.dim().0, times.len()));
    }
    for i in 1..times.len() {
      if times[i] < times[i - 1] {
        return Err(Error::InvalidData(format!("observation {} at t = {} precedes the one before it (t = {})",
                                              i, times[i], times[i - 1])));
      }
    }
    Ok(ObservationRecord { times, values, })
  }

  pub fn len(&self) -> usize { self.times.len() }
  pub fn is_empty(&self) -> bool { self.times.len() == 0 }
  pub fn obs_dim(&self) -> usize { self.values.dim().1 }
  pub fn time(&self, i: usize) -> f64 { self.times[i] }

  /// Measurements `index + 1 - lag ..= index`, oldest first.
  pub fn window(&self, index: usize, lag: usize) -> Result<ArrayView<f64, Ix2>> {
    if lag == 0 || lag > index + 1 || index >= self.len() {
      return Err(Error::mismatch("observation window", index + 1, lag));
    }
    Ok(self.values.slice(s![index + 1 - lag..index + 1, ..]))
  }
}

struct Table {
  rows: usize,
  cols: usize,
  values: Vec<f64>,
}

impl Table {
  fn into_array(self) -> Result<Array<f64, Ix2>> {
    Array::from_shape_vec((self.rows, self.cols), self.values)
      .map_err(|e| Error::InvalidData(format!("{}", e)))
  }
}

fn read_table(path: &Path, delimiter: u8, context: &'static str) -> Result<Table> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .delimiter(delimiter)
    .flexible(true)
    .trim(csv::Trim::All)
    .comment(Some(b'#'))
    .from_path(path)
    .map_err(|e| Error::io(path, e.into()))?;

  let mut table = Table {
    rows: 0,
    cols: 0,
    values: Vec::new(),
  };
  for record in reader.records() {
    let record = record.map_err(|e| Error::io(path, e.into()))?;
    let line = record.position()
      .map(|p| p.line() as usize)
      .unwrap_or(table.rows + 1);

    if table.rows == 0 {
      table.cols = record.len();
    } else if record.len() != table.cols {
      return Err(Error::mismatch(context, table.cols, record.len()));
    }

    for field in record.iter() {
      let v = field.parse::<f64>()
        .map_err(|_| Error::Parse {
          path: path.to_path_buf(),
          line,
          value: field.to_string(),
        })?;
      table.values.push(v);
    }
    table.rows += 1;
  }

  Ok(table)
}

fn write_rows<P, I>(path: P, delimiter: u8, rows: I) -> Result<()>
  where P: AsRef<Path>,
        I: IntoIterator<Item = Vec<f64>>,
{
  let path = path.as_ref();
  let mut writer = csv::WriterBuilder::new()
    .has_headers(false)
    .delimiter(delimiter)
    .from_path(path)
    .map_err(|e| Error::io(path, e.into()))?;

  for row in rows {
    writer.write_record(row.iter().map(|v| format!("{:.5}", v)))
      .map_err(|e| Error::io(path, e.into()))?;
  }
  writer.flush()
    .map_err(|e| Error::io(path, e))
}

/// Reads `[t, m_1 .. m_obs_dim]` rows.
pub fn read_observations<P>(path: P) -> Result<ObservationRecord>
  where P: AsRef<Path>,
{
  let path = path.as_ref();
  let table = read_table(path, b'\t', "observation file columns")?;
  if table.rows == 0 {
    return Err(Error::InvalidData(format!("{} holds no observations", path.display())));
  }
  if table.cols < 2 {
    return Err(Error::mismatch("observation file columns", 2, table.cols));
  }

  let all = table.into_array()?;
  let times = all.column(0).to_owned();
  let values = all.slice(s![.., 1..]).to_owned();
  debug!("read {} observations of dimension {} from {}",
         times.len(), values.dim().1, path.display());
  ObservationRecord::new(times, values)
}

pub fn read_params<P>(path: P) -> Result<Parameters>
  where P: AsRef<Path>,
{
  let path = path.as_ref();
  let table = read_table(path, b'\t', "parameter file columns")?;
  if table.rows == 0 || table.cols == 0 {
    return Err(Error::InvalidData(format!("{} holds no parameters", path.display())));
  }
  table.into_array()
}

pub fn write_params<P>(path: P, params: ArrayView<f64, Ix2>) -> Result<()>
  where P: AsRef<Path>,
{
  write_rows(path, b'\t', params.rows().into_iter().map(|r| r.to_vec()))
}

/// One row per output step: the time, then each member's state.
pub fn write_ensemble<P>(path: P, ensemble: TrajectoryView, times: ArrayView<f64, Ix1>) -> Result<()>
  where P: AsRef<Path>,
{
  if times.len() != ensemble.steps() {
    return Err(Error::mismatch("ensemble output times", ensemble.steps(), times.len()));
  }

  let sim_dim = ensemble.sim_dim();
  let members = ensemble.members();
  let rows = times.iter()
    .enumerate()
    .map(|(n, &t)| {
      let mut row = Vec::with_capacity(1 + sim_dim * members);
      row.push(t);
      for k in 0..members {
        for d in 0..sim_dim {
          row.push(ensemble.at(n, d, k));
        }
      }
      row
    });
  write_rows(path, b' ', rows)
}

/// Inverse of `write_ensemble`.
pub fn read_ensemble<P>(path: P, sim_dim: usize) -> Result<(TrajectoryBuffer, Array<f64, Ix1>)>
  where P: AsRef<Path>,
{
  let table = read_table(path.as_ref(), b' ', "ensemble file columns")?;
  if sim_dim == 0 || table.cols < 1 || (table.cols - 1) % sim_dim != 0 {
    return Err(Error::mismatch("ensemble file columns", 1 + sim_dim, table.cols));
  }

  let members = (table.cols - 1) / sim_dim;
  let all = table.into_array()?;
  let mut buffer = TrajectoryBuffer::zeros(all.dim().0, sim_dim, members);
  for (n, row) in all.rows().into_iter().enumerate() {
    let mut state = buffer.state_mut(n);
    for k in 0..members {
      for d in 0..sim_dim {
        state[[d, k]] = row[1 + k * sim_dim + d];
      }
    }
  }

  Ok((buffer, all.column(0).to_owned()))
}

/// Where a run writes its per-iteration files.
#[derive(Debug, Clone)]
pub struct OutputLayout {
  dir: PathBuf,
}

impl OutputLayout {
  /// Creates `dir` if it doesn't exist yet.
  pub fn new<P>(dir: P) -> Result<OutputLayout>
    where P: Into<PathBuf>,
  {
    let dir = dir.into();
    fs::create_dir_all(&dir)
      .map_err(|e| Error::io(&dir, e))?;
    Ok(OutputLayout { dir, })
  }

  pub fn dir(&self) -> &Path { &self.dir }

  pub fn params_path(&self, i: usize) -> PathBuf {
    self.dir.join(format!("param.{}.dat", i))
  }
  pub fn ensemble_path(&self, i: usize) -> PathBuf {
    self.dir.join(format!("ensemble.{}.dat", i))
  }
  pub fn analysis_path(&self, i: usize) -> PathBuf {
    self.dir.join(format!("analysis.{}.dat", i))
  }

  /// Copies the initial parameter file into place as `param.0.dat`.
  pub fn seed_params<P>(&self, src: P) -> Result<PathBuf>
    where P: AsRef<Path>,
  {
    let dest = self.params_path(0);
    fs::copy(src.as_ref(), &dest)
      .map_err(|e| Error::io(src.as_ref(), e))?;
    Ok(dest)
  }
}
