//! Metadata: samples, contigs, and path names.
//!
//! The metadata is optional and structural: it does not affect the queries.
//! Sequence `2 * i` (or `i` in a unidirectional index) corresponds to path
//! `i` in the path name table.

use crate::GBWTError;
use crate::support::{self, Dictionary};

use simple_sds::serialize::Serialize;

use std::collections::BTreeSet;
use std::fmt;
use std::io;


//-----------------------------------------------------------------------------

/// A structured name for one path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathName {
    /// Sample identifier.
    pub sample: usize,
    /// Contig identifier.
    pub contig: usize,
    /// Phase / haplotype number.
    pub phase: usize,
    /// Fragment index or running count.
    pub count: usize,
}

impl PathName {
    /// Creates a new path name.
    pub fn new(sample: usize, contig: usize, phase: usize, count: usize) -> Self {
        PathName { sample, contig, phase, count }
    }
}

//-----------------------------------------------------------------------------

/// Metadata for the paths in an index.
///
/// The sample and contig counts are always present. Sample names, contig
/// names, and path names are optional; the names map identifiers used in
/// [`PathName`] fields to strings.
///
/// # Examples
///
/// ```
/// use gbwt::{Metadata, PathName};
///
/// let mut metadata = Metadata::new();
/// metadata.set_sample_names(&["GRCh38", "NA12878"]);
/// metadata.set_contigs(2);
/// metadata.set_haplotypes(3);
/// metadata.add_path(PathName::new(1, 0, 1, 0));
///
/// assert_eq!(metadata.samples(), 2);
/// assert_eq!(metadata.sample_id("NA12878"), Some(1));
/// assert_eq!(metadata.paths_for_sample(1), vec![0]);
/// assert!(metadata.check());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    sample_count: usize,
    haplotype_count: usize,
    contig_count: usize,
    sample_names: Option<Dictionary>,
    contig_names: Option<Dictionary>,
    path_names: Vec<PathName>,
}

impl Metadata {
    const FLAG_PATH_NAMES: u64 = 0x1;
    const FLAG_SAMPLE_NAMES: u64 = 0x2;
    const FLAG_CONTIG_NAMES: u64 = 0x4;
    const FLAG_MASK: u64 = 0x7;

    /// Creates an empty metadata object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.sample_count
    }

    /// Returns the number of haplotypes.
    #[inline]
    pub fn haplotypes(&self) -> usize {
        self.haplotype_count
    }

    /// Returns the number of contigs.
    #[inline]
    pub fn contigs(&self) -> usize {
        self.contig_count
    }

    /// Returns the number of paths with names.
    #[inline]
    pub fn paths(&self) -> usize {
        self.path_names.len()
    }

    /// Sets the number of samples without changing the names.
    pub fn set_samples(&mut self, n: usize) {
        self.sample_count = n;
    }

    /// Sets the number of haplotypes.
    pub fn set_haplotypes(&mut self, n: usize) {
        self.haplotype_count = n;
    }

    /// Sets the number of contigs without changing the names.
    pub fn set_contigs(&mut self, n: usize) {
        self.contig_count = n;
    }

    /// Resets the metadata to the empty state.
    pub fn clear(&mut self) {
        *self = Metadata::default();
    }

    /// Returns `true` if the metadata is internally consistent.
    pub fn check(&self) -> bool {
        if let Some(names) = &self.sample_names {
            if names.len() != self.sample_count {
                return false;
            }
        }
        if let Some(names) = &self.contig_names {
            if names.len() != self.contig_count {
                return false;
            }
        }
        true
    }

    //-------------------------------------------------------------------------

    // Sample names.

    /// Returns `true` if the metadata contains sample names.
    #[inline]
    pub fn has_sample_names(&self) -> bool {
        self.sample_names.is_some()
    }

    /// Sets the sample names and the sample count. An empty list clears the
    /// names without changing the count.
    pub fn set_sample_names<T: AsRef<str>>(&mut self, names: &[T]) {
        if names.is_empty() {
            self.clear_sample_names();
            return;
        }
        self.sample_count = names.len();
        self.sample_names = Some(Dictionary::new(names));
    }

    /// Appends new sample names, updating the sample count.
    pub fn add_samples<T: AsRef<str>>(&mut self, names: &[T]) {
        if names.is_empty() {
            return;
        }
        let additional = Dictionary::new(names);
        match &mut self.sample_names {
            Some(existing) => existing.append(&additional),
            None => self.sample_names = Some(additional),
        }
        self.sample_count = self.sample_names.as_ref().map(|dict| dict.len()).unwrap_or(0);
    }

    /// Removes the sample names without changing the sample count.
    pub fn clear_sample_names(&mut self) {
        self.sample_names = None;
    }

    /// Returns the name of the given sample.
    pub fn sample_name(&self, i: usize) -> Option<&str> {
        self.sample_names.as_ref()?.key(i)
    }

    /// Returns the identifier of the given sample name.
    pub fn sample_id(&self, name: &str) -> Option<usize> {
        self.sample_names.as_ref()?.find(name)
    }

    //-------------------------------------------------------------------------

    // Contig names.

    /// Returns `true` if the metadata contains contig names.
    #[inline]
    pub fn has_contig_names(&self) -> bool {
        self.contig_names.is_some()
    }

    /// Sets the contig names and the contig count. An empty list clears the
    /// names without changing the count.
    pub fn set_contig_names<T: AsRef<str>>(&mut self, names: &[T]) {
        if names.is_empty() {
            self.clear_contig_names();
            return;
        }
        self.contig_count = names.len();
        self.contig_names = Some(Dictionary::new(names));
    }

    /// Appends new contig names, updating the contig count.
    pub fn add_contigs<T: AsRef<str>>(&mut self, names: &[T]) {
        if names.is_empty() {
            return;
        }
        let additional = Dictionary::new(names);
        match &mut self.contig_names {
            Some(existing) => existing.append(&additional),
            None => self.contig_names = Some(additional),
        }
        self.contig_count = self.contig_names.as_ref().map(|dict| dict.len()).unwrap_or(0);
    }

    /// Removes the contig names without changing the contig count.
    pub fn clear_contig_names(&mut self) {
        self.contig_names = None;
    }

    /// Returns the name of the given contig.
    pub fn contig_name(&self, i: usize) -> Option<&str> {
        self.contig_names.as_ref()?.key(i)
    }

    /// Returns the identifier of the given contig name.
    pub fn contig_id(&self, name: &str) -> Option<usize> {
        self.contig_names.as_ref()?.find(name)
    }

    //-------------------------------------------------------------------------

    // Path names.

    /// Returns `true` if the metadata contains path names.
    #[inline]
    pub fn has_path_names(&self) -> bool {
        !self.path_names.is_empty()
    }

    /// Appends a path name.
    pub fn add_path(&mut self, path: PathName) {
        self.path_names.push(path);
    }

    /// Returns the name of the given path.
    pub fn path(&self, i: usize) -> Option<PathName> {
        self.path_names.get(i).copied()
    }

    /// Returns an iterator over the path names.
    pub fn path_iter(&self) -> impl Iterator<Item = &PathName> {
        self.path_names.iter()
    }

    /// Removes all path names.
    pub fn clear_path_names(&mut self) {
        self.path_names.clear();
    }

    /// Returns the identifiers of the paths with the given sample and contig.
    pub fn find_paths(&self, sample_id: usize, contig_id: usize) -> Vec<usize> {
        self.path_names.iter().enumerate()
            .filter(|(_, path)| path.sample == sample_id && path.contig == contig_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the identifiers of the paths with the given sample.
    pub fn paths_for_sample(&self, sample_id: usize) -> Vec<usize> {
        self.path_names.iter().enumerate()
            .filter(|(_, path)| path.sample == sample_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the identifiers of the paths with the given contig.
    pub fn paths_for_contig(&self, contig_id: usize) -> Vec<usize> {
        self.path_names.iter().enumerate()
            .filter(|(_, path)| path.contig == contig_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Removes the given sample and the paths that use it. Later sample
    /// identifiers shift down by one.
    ///
    /// Returns the identifiers of the removed paths. Without path names, the
    /// new haplotype count is an estimate.
    pub fn remove_sample(&mut self, sample_id: usize) -> Vec<usize> {
        let mut result: Vec<usize> = Vec::new();
        if sample_id >= self.samples() {
            return result;
        }

        let haplotypes_to_remove;
        if self.has_path_names() {
            let mut phases: BTreeSet<usize> = BTreeSet::new();
            let mut tail = 0;
            for i in 0..self.path_names.len() {
                let mut path = self.path_names[i];
                if path.sample == sample_id {
                    phases.insert(path.phase);
                    result.push(i);
                } else {
                    if path.sample > sample_id {
                        path.sample -= 1;
                    }
                    self.path_names[tail] = path;
                    tail += 1;
                }
            }
            self.path_names.truncate(tail);
            haplotypes_to_remove = phases.len();
        } else {
            haplotypes_to_remove = if self.samples() > 0 { self.haplotypes() / self.samples() } else { 0 };
        }

        if let Some(names) = &mut self.sample_names {
            names.remove(sample_id);
        }
        self.sample_count -= 1;
        self.haplotype_count = self.haplotype_count.saturating_sub(haplotypes_to_remove);

        result
    }

    /// Removes the given contig and the paths that use it. Later contig
    /// identifiers shift down by one.
    ///
    /// Returns the identifiers of the removed paths.
    pub fn remove_contig(&mut self, contig_id: usize) -> Vec<usize> {
        let mut result: Vec<usize> = Vec::new();
        if contig_id >= self.contigs() {
            return result;
        }

        if self.has_path_names() {
            let mut tail = 0;
            for i in 0..self.path_names.len() {
                let mut path = self.path_names[i];
                if path.contig == contig_id {
                    result.push(i);
                } else {
                    if path.contig > contig_id {
                        path.contig -= 1;
                    }
                    self.path_names[tail] = path;
                    tail += 1;
                }
            }
            self.path_names.truncate(tail);
        }

        if let Some(names) = &mut self.contig_names {
            names.remove(contig_id);
        }
        self.contig_count -= 1;

        result
    }

    //-------------------------------------------------------------------------

    /// Merges the source metadata into this one.
    ///
    /// When both sides have sample (contig) names, the names are merged by
    /// matching them; otherwise the source identifiers are offset by the
    /// counts in this metadata, unless `same_samples` (`same_contigs`) states
    /// that both sides refer to the same samples (contigs). Name fields
    /// present on only one side are dropped when the identifiers cannot be
    /// matched reliably.
    pub fn merge(&mut self, source: &Metadata, same_samples: bool, same_contigs: bool) {
        let mut source_sample_offset = 0;
        let mut source_contig_offset = 0;
        let merge_sample_names = self.has_sample_names() && source.has_sample_names();
        let merge_contig_names = self.has_contig_names() && source.has_contig_names();
        let merge_path_names = self.has_path_names() && source.has_path_names();

        // Samples and haplotypes.
        if let (Some(ours), Some(theirs)) = (&self.sample_names, &source.sample_names) {
            let merged = Dictionary::merged(ours, theirs);
            if !merge_path_names && source.samples() > 0 {
                // Without path names we can only estimate the new haplotype count.
                let added = merged.len() - self.sample_count;
                self.haplotype_count += added * source.haplotypes() / source.samples();
            }
            self.sample_count = merged.len();
            self.sample_names = Some(merged);
        } else if same_samples {
            if !self.has_sample_names() && source.has_sample_names() {
                self.sample_names = source.sample_names.clone();
            }
        } else {
            source_sample_offset = self.samples();
            self.sample_count += source.samples();
            self.haplotype_count += source.haplotypes();
            // The source has no names for the new samples.
            self.sample_names = None;
        }

        // Contigs.
        if let (Some(ours), Some(theirs)) = (&self.contig_names, &source.contig_names) {
            let merged = Dictionary::merged(ours, theirs);
            self.contig_count = merged.len();
            self.contig_names = Some(merged);
        } else if same_contigs {
            if !self.has_contig_names() && source.has_contig_names() {
                self.contig_names = source.contig_names.clone();
            }
        } else {
            source_contig_offset = self.contigs();
            self.contig_count += source.contigs();
            self.contig_names = None;
        }

        // Paths.
        if merge_path_names {
            let sample_remap: Option<Vec<usize>> = if merge_sample_names {
                Some((0..source.samples()).map(|i| {
                    source.sample_name(i).and_then(|name| self.sample_id(name)).unwrap_or(i)
                }).collect())
            } else {
                None
            };
            let contig_remap: Option<Vec<usize>> = if merge_contig_names {
                Some((0..source.contigs()).map(|i| {
                    source.contig_name(i).and_then(|name| self.contig_id(name)).unwrap_or(i)
                }).collect())
            } else {
                None
            };

            let offset = self.path_names.len();
            self.path_names.extend(source.path_names.iter().copied());
            for path in self.path_names[offset..].iter_mut() {
                path.sample = match &sample_remap {
                    Some(remap) => remap.get(path.sample).copied().unwrap_or(path.sample),
                    None => path.sample + source_sample_offset,
                };
                path.contig = match &contig_remap {
                    Some(remap) => remap.get(path.contig).copied().unwrap_or(path.contig),
                    None => path.contig + source_contig_offset,
                };
            }
            if merge_sample_names {
                let found: BTreeSet<(usize, usize)> =
                    self.path_names.iter().map(|path| (path.sample, path.phase)).collect();
                self.haplotype_count = found.len();
            }
        } else if self.has_path_names() {
            // The source has no path names, so the combined table would be
            // incomplete.
            self.path_names.clear();
        }
    }

    //-------------------------------------------------------------------------

    fn flags(&self) -> u64 {
        let mut result = 0;
        if self.has_path_names() {
            result |= Self::FLAG_PATH_NAMES;
        }
        if self.has_sample_names() {
            result |= Self::FLAG_SAMPLE_NAMES;
        }
        if self.has_contig_names() {
            result |= Self::FLAG_CONTIG_NAMES;
        }
        result
    }

    pub(crate) fn load_with_errors<T: io::Read>(reader: &mut T) -> Result<Self, GBWTError> {
        let sample_count = support::read_word(reader)? as usize;
        let haplotype_count = support::read_word(reader)? as usize;
        let contig_count = support::read_word(reader)? as usize;
        let flags = support::read_word(reader)?;
        if flags & !Self::FLAG_MASK != 0 {
            return Err(GBWTError::UnsupportedVersion(format!(
                "unknown metadata flag bits {:#x}", flags & !Self::FLAG_MASK
            )));
        }

        let mut path_names: Vec<PathName> = Vec::new();
        if flags & Self::FLAG_PATH_NAMES != 0 {
            let count = support::read_word(reader)? as usize;
            path_names.reserve(count);
            for _ in 0..count {
                let sample = support::read_word(reader)? as usize;
                let contig = support::read_word(reader)? as usize;
                let phase = support::read_word(reader)? as usize;
                let fragment = support::read_word(reader)? as usize;
                path_names.push(PathName::new(sample, contig, phase, fragment));
            }
        }
        let sample_names = if flags & Self::FLAG_SAMPLE_NAMES != 0 {
            Some(Dictionary::load_with_errors(reader)?)
        } else {
            None
        };
        let contig_names = if flags & Self::FLAG_CONTIG_NAMES != 0 {
            Some(Dictionary::load_with_errors(reader)?)
        } else {
            None
        };

        let result = Metadata {
            sample_count, haplotype_count, contig_count,
            sample_names, contig_names, path_names,
        };
        if !result.check() {
            return Err(GBWTError::UnsupportedVersion(String::from("inconsistent metadata")));
        }
        Ok(result)
    }
}

impl Serialize for Metadata {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        support::write_word(writer, self.sample_count as u64)?;
        support::write_word(writer, self.haplotype_count as u64)?;
        support::write_word(writer, self.contig_count as u64)?;
        support::write_word(writer, self.flags())?;
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        if self.has_path_names() {
            support::write_word(writer, self.path_names.len() as u64)?;
            for path in self.path_names.iter() {
                support::write_word(writer, path.sample as u64)?;
                support::write_word(writer, path.contig as u64)?;
                support::write_word(writer, path.phase as u64)?;
                support::write_word(writer, path.count as u64)?;
            }
        }
        if let Some(names) = &self.sample_names {
            names.serialize(writer)?;
        }
        if let Some(names) = &self.contig_names {
            names.serialize(writer)?;
        }
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        Self::load_with_errors(reader).map_err(GBWTError::into_io)
    }

    fn size_in_elements(&self) -> usize {
        let mut result = 4;
        if self.has_path_names() {
            result += 1 + 4 * self.path_names.len();
        }
        if let Some(names) = &self.sample_names {
            result += names.size_in_elements();
        }
        if let Some(names) = &self.contig_names {
            result += names.size_in_elements();
        }
        result
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_path_names() {
            write!(f, "{} paths with names, ", self.paths())?;
        }
        write!(f, "{} samples", self.samples())?;
        if self.has_sample_names() {
            write!(f, " with names")?;
        }
        write!(f, ", {} haplotypes, {} contigs", self.haplotypes(), self.contigs())?;
        if self.has_contig_names() {
            write!(f, " with names")?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
