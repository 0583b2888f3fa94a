// EDF (European Data Format) reader/writer
// Specification: https://www.edfplus.info/specs/edf.html

use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, ScreenError};
use crate::types::Recording;

/// Main EDF header (256 bytes of fixed-width ASCII fields)
#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    pub start_date: String,
    pub start_time: String,
    pub header_bytes: usize,
    pub num_data_records: i64,
    pub record_duration_secs: f64,
    pub num_signals: usize,
}

/// Per-signal header (256 bytes per signal, stored column-wise)
#[derive(Debug, Clone)]
pub struct SignalHeader {
    pub label: String,
    pub transducer_type: String,
    pub physical_dimension: String,
    pub physical_minimum: f64,
    pub physical_maximum: f64,
    pub digital_minimum: i64,
    pub digital_maximum: i64,
    pub prefiltering: String,
    pub samples_per_record: usize,
}

impl SignalHeader {
    pub fn sample_rate(&self, record_duration_secs: f64) -> f64 {
        self.samples_per_record as f64 / record_duration_secs
    }

    /// Scale factor from digital i16 counts to physical units
    pub fn gain(&self) -> f64 {
        (self.physical_maximum - self.physical_minimum)
            / (self.digital_maximum - self.digital_minimum) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_maximum - self.gain() * self.digital_maximum as f64
    }
}

fn read_field<R: Read>(reader: &mut R, width: usize) -> Result<String> {
    let mut buffer = vec![0u8; width];
    reader.read_exact(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).trim().to_string())
}

fn read_parsed<T: FromStr, R: Read>(reader: &mut R, width: usize, field: &str) -> Result<T> {
    let text = read_field(reader, width)?;
    text.parse::<T>()
        .map_err(|_| ScreenError::Load(format!("invalid EDF {} field: '{}'", field, text)))
}

/// Read one column of the signal header block: the same field for all signals
fn read_field_column<R: Read>(reader: &mut R, count: usize, width: usize) -> Result<Vec<String>> {
    (0..count).map(|_| read_field(reader, width)).collect()
}

fn parse_column<T: FromStr>(column: Vec<String>, field: &str) -> Result<Vec<T>> {
    column
        .into_iter()
        .map(|text| {
            text.parse::<T>()
                .map_err(|_| ScreenError::Load(format!("invalid EDF {} field: '{}'", field, text)))
        })
        .collect()
}

#[derive(Debug)]
pub struct EdfReader {
    file: BufReader<File>,
    pub header: EdfHeader,
    pub signal_headers: Vec<SignalHeader>,
    data_start_offset: u64,
}

impl EdfReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ScreenError::Load(format!("cannot open '{}': {}", path.display(), e)))?;
        let mut file = BufReader::new(file);

        let header = Self::read_header(&mut file)?;
        let signal_headers = Self::read_signal_headers(&mut file, header.num_signals)?;
        let data_start_offset = header.header_bytes as u64;

        log::debug!(
            "opened EDF '{}': {} signals, {} records of {}s",
            path.display(),
            header.num_signals,
            header.num_data_records,
            header.record_duration_secs
        );

        Ok(Self {
            file,
            header,
            signal_headers,
            data_start_offset,
        })
    }

    fn read_header<R: Read>(reader: &mut R) -> Result<EdfHeader> {
        let version = read_field(reader, 8)?;
        let patient_id = read_field(reader, 80)?;
        let recording_id = read_field(reader, 80)?;
        let start_date = read_field(reader, 8)?;
        let start_time = read_field(reader, 8)?;
        let header_bytes = read_parsed::<usize, _>(reader, 8, "header bytes")?;
        let _reserved = read_field(reader, 44)?;
        let num_data_records = read_parsed::<i64, _>(reader, 8, "record count")?;
        let record_duration_secs = read_parsed::<f64, _>(reader, 8, "record duration")?;
        let num_signals = read_parsed::<usize, _>(reader, 4, "signal count")?;

        if record_duration_secs <= 0.0 {
            return Err(ScreenError::Load(format!(
                "non-positive record duration: {}",
                record_duration_secs
            )));
        }

        Ok(EdfHeader {
            version,
            patient_id,
            recording_id,
            start_date,
            start_time,
            header_bytes,
            num_data_records,
            record_duration_secs,
            num_signals,
        })
    }

    fn read_signal_headers<R: Read>(reader: &mut R, count: usize) -> Result<Vec<SignalHeader>> {
        let labels = read_field_column(reader, count, 16)?;
        let transducer_types = read_field_column(reader, count, 80)?;
        let physical_dimensions = read_field_column(reader, count, 8)?;
        let physical_minimums =
            parse_column::<f64>(read_field_column(reader, count, 8)?, "physical minimum")?;
        let physical_maximums =
            parse_column::<f64>(read_field_column(reader, count, 8)?, "physical maximum")?;
        let digital_minimums =
            parse_column::<i64>(read_field_column(reader, count, 8)?, "digital minimum")?;
        let digital_maximums =
            parse_column::<i64>(read_field_column(reader, count, 8)?, "digital maximum")?;
        let prefilterings = read_field_column(reader, count, 80)?;
        let samples_per_records =
            parse_column::<usize>(read_field_column(reader, count, 8)?, "samples per record")?;
        let _reserveds = read_field_column(reader, count, 32)?;

        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            if digital_maximums[i] == digital_minimums[i] {
                return Err(ScreenError::Load(format!(
                    "signal '{}' has a degenerate digital range",
                    labels[i]
                )));
            }
            headers.push(SignalHeader {
                label: labels[i].clone(),
                transducer_type: transducer_types[i].clone(),
                physical_dimension: physical_dimensions[i].clone(),
                physical_minimum: physical_minimums[i],
                physical_maximum: physical_maximums[i],
                digital_minimum: digital_minimums[i],
                digital_maximum: digital_maximums[i],
                prefiltering: prefilterings[i].clone(),
                samples_per_record: samples_per_records[i],
            });
        }

        Ok(headers)
    }

    /// Total recording duration in seconds
    pub fn total_duration(&self) -> f64 {
        self.header.num_data_records.max(0) as f64 * self.header.record_duration_secs
    }

    /// Read one data record as raw digital samples, one inner vec per signal
    pub fn read_record(&mut self, record_index: usize) -> Result<Vec<Vec<i16>>> {
        if self.header.num_data_records < 0
            || record_index >= self.header.num_data_records as usize
        {
            return Err(ScreenError::Load(format!(
                "record index {} out of bounds ({} records)",
                record_index, self.header.num_data_records
            )));
        }

        // Each sample is one little-endian i16
        let record_bytes: usize = self
            .signal_headers
            .iter()
            .map(|sh| sh.samples_per_record * 2)
            .sum();

        let record_offset = self.data_start_offset + (record_index * record_bytes) as u64;
        self.file.seek(SeekFrom::Start(record_offset))?;

        let mut buffer = vec![0u8; record_bytes];
        self.file.read_exact(&mut buffer)?;

        let mut signals = Vec::with_capacity(self.signal_headers.len());
        let mut cursor = 0;
        for sh in &self.signal_headers {
            let samples: Vec<i16> = buffer[cursor..cursor + sh.samples_per_record * 2]
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            cursor += sh.samples_per_record * 2;
            signals.push(samples);
        }

        Ok(signals)
    }

    /// Read one data record converted to physical units
    pub fn read_physical_record(&mut self, record_index: usize) -> Result<Vec<Vec<f64>>> {
        let digital = self.read_record(record_index)?;

        let physical: Vec<Vec<f64>> = digital
            .par_iter()
            .enumerate()
            .map(|(signal_idx, samples)| {
                let sh = &self.signal_headers[signal_idx];
                let gain = sh.gain();
                let offset = sh.offset();
                samples.iter().map(|&d| gain * d as f64 + offset).collect()
            })
            .collect();

        Ok(physical)
    }
}

/// Load a complete recording into memory, all channels in physical units.
///
/// The sample rate is taken from the first signal header; recordings whose
/// signals disagree on samples-per-record are rejected rather than resampled.
pub fn read_recording<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let mut reader = EdfReader::open(path)?;

    if reader.signal_headers.is_empty() {
        return Err(ScreenError::Load("recording has no signals".to_string()));
    }
    if reader.header.num_data_records <= 0 {
        return Err(ScreenError::Load(format!(
            "recording has no data records (count {})",
            reader.header.num_data_records
        )));
    }

    let samples_per_record = reader.signal_headers[0].samples_per_record;
    if reader
        .signal_headers
        .iter()
        .any(|sh| sh.samples_per_record != samples_per_record)
    {
        return Err(ScreenError::Load(
            "signals have differing sample rates".to_string(),
        ));
    }

    let num_records = reader.header.num_data_records as usize;
    let num_channels = reader.signal_headers.len();
    let sample_rate = reader.signal_headers[0].sample_rate(reader.header.record_duration_secs);
    let channel_labels: Vec<String> = reader
        .signal_headers
        .iter()
        .map(|sh| sh.label.clone())
        .collect();

    let mut channels: Vec<Vec<f64>> = (0..num_channels)
        .map(|_| Vec::with_capacity(num_records * samples_per_record))
        .collect();
    for record_index in 0..num_records {
        let record = reader.read_physical_record(record_index)?;
        for (channel, samples) in channels.iter_mut().zip(record) {
            channel.extend(samples);
        }
    }

    log::debug!(
        "loaded recording: {} channels x {} samples at {} Hz",
        num_channels,
        channels[0].len(),
        sample_rate
    );

    Ok(Recording {
        channel_labels,
        sample_rate,
        channels,
    })
}

#[derive(Debug)]
pub struct EdfWriter {
    file: File,
    header: EdfHeader,
    signal_headers: Vec<SignalHeader>,
}

impl EdfWriter {
    pub fn create<P: AsRef<Path>>(
        path: P,
        patient_id: &str,
        recording_id: &str,
        record_duration_secs: f64,
        signal_headers: Vec<SignalHeader>,
    ) -> Result<Self> {
        let num_signals = signal_headers.len();
        let header = EdfHeader {
            version: "0".to_string(),
            patient_id: patient_id.to_string(),
            recording_id: recording_id.to_string(),
            start_date: "01.01.00".to_string(),
            start_time: "00.00.00".to_string(),
            header_bytes: 256 + num_signals * 256,
            num_data_records: -1, // patched by finalize()
            record_duration_secs,
            num_signals,
        };

        let file = File::create(path)?;
        let mut writer = Self {
            file,
            header,
            signal_headers,
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_field(&mut self, text: &str, width: usize) -> Result<()> {
        let mut buffer = vec![b' '; width];
        let bytes = text.as_bytes();
        let len = bytes.len().min(width);
        buffer[..len].copy_from_slice(&bytes[..len]);
        self.file.write_all(&buffer)?;
        Ok(())
    }

    /// Numeric fields must fit their fixed width exactly; truncating one
    /// would silently corrupt the header
    fn write_numeric_field(&mut self, text: &str, width: usize, field: &str) -> Result<()> {
        if text.len() > width {
            return Err(ScreenError::InvalidConfig(format!(
                "EDF {} '{}' does not fit in {} bytes",
                field, text, width
            )));
        }
        self.write_field(text, width)
    }

    fn write_header(&mut self) -> Result<()> {
        let h = self.header.clone();
        self.write_field(&h.version, 8)?;
        self.write_field(&h.patient_id, 80)?;
        self.write_field(&h.recording_id, 80)?;
        self.write_field(&h.start_date, 8)?;
        self.write_field(&h.start_time, 8)?;
        self.write_numeric_field(&h.header_bytes.to_string(), 8, "header bytes")?;
        self.write_field("", 44)?;
        self.write_numeric_field(&h.num_data_records.to_string(), 8, "record count")?;
        self.write_numeric_field(&h.record_duration_secs.to_string(), 8, "record duration")?;
        self.write_numeric_field(&h.num_signals.to_string(), 4, "signal count")?;

        // Signal headers are stored column-wise: each field for all signals
        let shs = self.signal_headers.clone();
        for sh in &shs {
            self.write_field(&sh.label, 16)?;
        }
        for sh in &shs {
            self.write_field(&sh.transducer_type, 80)?;
        }
        for sh in &shs {
            self.write_field(&sh.physical_dimension, 8)?;
        }
        for sh in &shs {
            self.write_numeric_field(&sh.physical_minimum.to_string(), 8, "physical minimum")?;
        }
        for sh in &shs {
            self.write_numeric_field(&sh.physical_maximum.to_string(), 8, "physical maximum")?;
        }
        for sh in &shs {
            self.write_numeric_field(&sh.digital_minimum.to_string(), 8, "digital minimum")?;
        }
        for sh in &shs {
            self.write_numeric_field(&sh.digital_maximum.to_string(), 8, "digital maximum")?;
        }
        for sh in &shs {
            self.write_field(&sh.prefiltering, 80)?;
        }
        for sh in &shs {
            self.write_numeric_field(&sh.samples_per_record.to_string(), 8, "samples per record")?;
        }
        for _ in &shs {
            self.write_field("", 32)?;
        }

        Ok(())
    }

    /// Write one data record of physical samples, one inner slice per signal
    pub fn write_physical_record(&mut self, physical: &[Vec<f64>]) -> Result<()> {
        if physical.len() != self.signal_headers.len() {
            return Err(ScreenError::Load(format!(
                "expected {} signals, got {}",
                self.signal_headers.len(),
                physical.len()
            )));
        }

        for (signal_idx, samples) in physical.iter().enumerate() {
            let sh = &self.signal_headers[signal_idx];
            if samples.len() != sh.samples_per_record {
                return Err(ScreenError::Load(format!(
                    "signal {} expected {} samples per record, got {}",
                    signal_idx,
                    sh.samples_per_record,
                    samples.len()
                )));
            }

            let gain = sh.gain();
            let offset = sh.offset();
            for &value in samples {
                let digital = ((value - offset) / gain).round() as i16;
                self.file.write_all(&digital.to_le_bytes())?;
            }
        }

        Ok(())
    }

    /// Patch the record count into the header and flush
    pub fn finalize(mut self, num_records_written: i64) -> Result<()> {
        // num_data_records lives at byte 236 of the main header
        self.file.seek(SeekFrom::Start(236))?;
        self.write_numeric_field(&num_records_written.to_string(), 8, "record count")?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal_header() -> SignalHeader {
        SignalHeader {
            label: "EEG Fp1".to_string(),
            transducer_type: String::new(),
            physical_dimension: "uV".to_string(),
            physical_minimum: -100.0,
            physical_maximum: 100.0,
            digital_minimum: -32768,
            digital_maximum: 32767,
            prefiltering: String::new(),
            samples_per_record: 256,
        }
    }

    #[test]
    fn test_signal_header_scaling() {
        let sh = test_signal_header();
        assert_eq!(sh.sample_rate(1.0), 256.0);
        assert!((sh.gain() - 0.00305).abs() < 0.001);
        // Round trip: physical -> digital -> physical stays within one count
        let physical = 42.0;
        let digital = ((physical - sh.offset()) / sh.gain()).round();
        let back = sh.gain() * digital + sh.offset();
        assert!((back - physical).abs() <= sh.gain());
    }

    #[test]
    fn test_open_missing_file() {
        let err = EdfReader::open("/nonexistent/recording.edf").unwrap_err();
        assert!(matches!(err, ScreenError::Load(_)));
    }

    #[test]
    fn test_writer_rejects_overwide_numeric_field() {
        // "0.123456789" is 11 chars, the duration field holds 8
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_duration.edf");
        let err = EdfWriter::create(&path, "X", "t", 0.123456789, vec![test_signal_header()])
            .unwrap_err();
        assert!(matches!(err, ScreenError::InvalidConfig(_)));
    }
}
