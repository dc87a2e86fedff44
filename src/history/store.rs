//! Archive of completed generations grouped into runs.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::format::{CompressionType, HistoryFormatError, read_blob, write_blob};
use crate::compute::evolution::{Population, PopulationSnapshot};
use crate::schema::GenerationStats;

/// Address of a recorded generation.
///
/// `run == runs().len()` addresses the open run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationRef {
    pub run: usize,
    pub index: usize,
}

/// One completed generation with a deep copy of its population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    /// Best fitness reached in this generation.
    pub best_fitness: f32,
    pub average_fitness: f32,
    /// Agents still alive at turnover.
    pub alive_count: usize,
    pub score: u64,
    pub ticks: u64,
    /// Obstacle layout seed, for replay.
    pub world_seed: u64,
    /// Population as it was evaluated, before evolving.
    pub population: PopulationSnapshot,
}

/// Generations recorded between two population resets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub generations: Vec<GenerationRecord>,
}

impl RunRecord {
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }
}

/// Flat row for list displays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run: usize,
    pub index: usize,
    pub generation: usize,
    pub best_fitness: f32,
    pub alive_count: usize,
}

/// Closed runs, the open run, and a copy of the best generation ever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStore {
    runs: Vec<RunRecord>,
    current: RunRecord,
    best: Option<GenerationRecord>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the open run if it holds anything and open a new one.
    pub fn start_run(&mut self) {
        if !self.current.is_empty() {
            let finished = std::mem::take(&mut self.current);
            self.runs.push(finished);
        }
    }

    /// Append a generation to the open run.
    ///
    /// The population is deep-copied, so later evolution never alters
    /// the record.
    pub fn record(&mut self, stats: &GenerationStats, population: &Population) {
        let record = GenerationRecord {
            generation: stats.generation,
            best_fitness: stats.best_fitness,
            average_fitness: stats.average_fitness,
            alive_count: stats.alive_count,
            score: stats.score,
            ticks: stats.ticks,
            world_seed: stats.world_seed,
            population: population.snapshot(),
        };

        // Unlike a zero baseline, the first record always becomes the best,
        // even when every agent scored 0.
        let improves = self
            .best
            .as_ref()
            .is_none_or(|best| record.best_fitness > best.best_fitness);
        if improves {
            self.best = Some(record.clone());
        }
        self.current.generations.push(record);
    }

    pub fn best_ever(&self) -> Option<&GenerationRecord> {
        self.best.as_ref()
    }

    pub fn best_fitness_ever(&self) -> f32 {
        self.best.as_ref().map_or(0.0, |best| best.best_fitness)
    }

    /// Closed runs, oldest first.
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    pub fn current_run(&self) -> &RunRecord {
        &self.current
    }

    pub fn get(&self, at: GenerationRef) -> Option<&GenerationRecord> {
        let run = if at.run == self.runs.len() {
            &self.current
        } else {
            self.runs.get(at.run)?
        };
        run.generations.get(at.index)
    }

    /// Total number of recorded generations.
    pub fn len(&self) -> usize {
        self.runs.iter().map(RunRecord::len).sum::<usize>() + self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.runs
            .iter()
            .chain(std::iter::once(&self.current))
            .enumerate()
            .flat_map(|(run, record)| {
                record
                    .generations
                    .iter()
                    .enumerate()
                    .map(move |(index, g)| HistoryEntry {
                        run,
                        index,
                        generation: g.generation,
                        best_fitness: g.best_fitness,
                        alive_count: g.alive_count,
                    })
            })
            .collect()
    }

    /// Write the whole store as a history blob.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), HistoryFormatError> {
        self.save_with(writer, CompressionType::preferred())
    }

    pub fn save_with<W: Write>(
        &self,
        writer: &mut W,
        compression: CompressionType,
    ) -> Result<(), HistoryFormatError> {
        let json = serde_json::to_vec(self)?;
        write_blob(writer, &json, compression)
    }

    pub fn load<R: Read>(reader: &mut R) -> Result<Self, HistoryFormatError> {
        let json = read_blob(reader)?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, HistoryFormatError> {
        let mut bytes = Vec::new();
        self.save(&mut bytes)?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HistoryFormatError> {
        Self::load(&mut Cursor::new(bytes))
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), HistoryFormatError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, HistoryFormatError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::load(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::NetworkShape;
    use crate::schema::{AgentConfig, GeneticConfig};

    fn population() -> Population {
        let config = GeneticConfig {
            population_size: 4,
            ..Default::default()
        };
        Population::new(config, NetworkShape::new(4, 3, 1), AgentConfig::default(), 11)
    }

    fn stats(generation: usize, best_fitness: f32) -> GenerationStats {
        GenerationStats {
            generation,
            best_fitness,
            average_fitness: best_fitness / 2.0,
            best_fitness_ever: best_fitness,
            alive_count: 0,
            score: 1,
            ticks: best_fitness as u64,
            world_seed: 42 + generation as u64,
        }
    }

    #[test]
    fn test_start_run_skips_empty_runs() {
        let mut store = HistoryStore::new();
        store.start_run();
        store.start_run();
        assert!(store.runs().is_empty());

        store.record(&stats(1, 10.0), &population());
        store.start_run();
        store.start_run();
        assert_eq!(store.runs().len(), 1);
        assert!(store.current_run().is_empty());
    }

    #[test]
    fn test_best_updates_only_on_strict_improvement() {
        let mut store = HistoryStore::new();
        let pop = population();

        store.record(&stats(1, 0.0), &pop);
        assert_eq!(store.best_ever().map(|b| b.generation), Some(1));

        store.record(&stats(2, 25.0), &pop);
        store.record(&stats(3, 25.0), &pop);
        store.record(&stats(4, 12.0), &pop);
        assert_eq!(store.best_ever().map(|b| b.generation), Some(2));
        assert_eq!(store.best_fitness_ever(), 25.0);
    }

    #[test]
    fn test_records_are_independent_of_population() {
        let mut store = HistoryStore::new();
        let mut pop = population();
        store.record(&stats(1, 5.0), &pop);
        let before = store.current_run().generations[0].clone();

        pop.agents_mut()[0].set_fitness(99.0);
        pop.evolve().unwrap();

        assert_eq!(store.current_run().generations[0], before);
        assert_eq!(store.best_ever(), Some(&before));
    }

    #[test]
    fn test_get_and_entries_address_runs() {
        let mut store = HistoryStore::new();
        let pop = population();
        store.record(&stats(1, 3.0), &pop);
        store.record(&stats(2, 4.0), &pop);
        store.start_run();
        store.record(&stats(1, 6.0), &pop);

        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get(GenerationRef { run: 0, index: 1 }).map(|g| g.best_fitness),
            Some(4.0)
        );
        assert_eq!(
            store.get(GenerationRef { run: 1, index: 0 }).map(|g| g.best_fitness),
            Some(6.0)
        );
        assert!(store.get(GenerationRef { run: 2, index: 0 }).is_none());
        assert!(store.get(GenerationRef { run: 0, index: 2 }).is_none());

        let entries = store.entries();
        let keys: Vec<(usize, usize, usize)> = entries
            .iter()
            .map(|e| (e.run, e.index, e.generation))
            .collect();
        assert_eq!(keys, vec![(0, 0, 1), (0, 1, 2), (1, 0, 1)]);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut store = HistoryStore::new();
        let pop = population();
        store.record(&stats(1, 7.0), &pop);
        store.start_run();
        store.record(&stats(1, 9.0), &pop);

        let bytes = store.to_bytes().unwrap();
        let loaded = HistoryStore::from_bytes(&bytes).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.nfh");

        let mut store = HistoryStore::new();
        store.record(&stats(1, 2.0), &population());
        store.save_to_path(&path).unwrap();

        let loaded = HistoryStore::load_from_path(&path).unwrap();
        assert_eq!(loaded, store);
    }
}
