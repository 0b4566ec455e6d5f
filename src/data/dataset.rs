use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::vocab::Vocabulary;
use crate::domain::example::TextPair;
use crate::error::Result;

/// One tokenised example, unpadded.
/// src: `words <eos>`   trg: `<sos> words <eos>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPair {
    pub src: Vec<u32>,
    pub trg: Vec<u32>,
}

impl EncodedPair {
    pub fn encode(pair: &TextPair, src_vocab: &Vocabulary, trg_vocab: &Vocabulary) -> Result<Self> {
        Ok(Self {
            src: src_vocab.encode_source(&pair.src)?,
            trg: trg_vocab.encode_target(&pair.trg)?,
        })
    }
}

pub struct Seq2SeqDataset {
    pairs: Vec<EncodedPair>,
}

impl Seq2SeqDataset {
    pub fn new(pairs: Vec<EncodedPair>) -> Self { Self { pairs } }

    pub fn encode(pairs: &[TextPair], src_vocab: &Vocabulary, trg_vocab: &Vocabulary) -> Result<Self> {
        let pairs = pairs
            .iter()
            .map(|p| EncodedPair::encode(p, src_vocab, trg_vocab))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(pairs))
    }
}

impl Dataset<EncodedPair> for Seq2SeqDataset {
    fn get(&self, index: usize) -> Option<EncodedPair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}
