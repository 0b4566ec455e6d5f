// ============================================================
// Layer 5 — GRU Encoder / Attention Decoder
// ============================================================
// The model pair the training core drives:
//
//   EncoderRnn  ids [batch, src_len] + true lengths
//                 → outputs [batch, src_len, enc_hidden]
//                 → final hidden per layer [batch, enc_hidden]
//   DecoderRnn  one step at a time: previous token + state
//                 → logits [batch, trg_vocab]
//
// Both stacks are built from a hand-written GRU cell rather than
// burn's Gru module so the encoder can honour per-sequence
// lengths: past a sequence's end the hidden state is carried
// unchanged and the output is zero (what a packed sequence gives).
//
// The decoder feeds [embedding; previous context] into its GRU and
// attends over the encoder outputs with Luong "general" scoring,
// masking padded source positions.
//
// Reference: Cho et al. (2014) GRU
//            Luong et al. (2015) Effective Approaches to
//            Attention-based Neural Machine Translation

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{
        activation::{sigmoid, softmax, tanh},
        TensorData,
    },
};

// ─── GRU cell ─────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    /// x → [reset | update | candidate]
    input_gates:  Linear<B>,
    /// h → [reset | update | candidate]
    hidden_gates: Linear<B>,
}

impl<B: Backend> GruCell<B> {
    pub fn new(d_input: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            input_gates:  LinearConfig::new(d_input, 3 * d_hidden).init(device),
            hidden_gates: LinearConfig::new(d_hidden, 3 * d_hidden).init(device),
        }
    }

    /// x: [batch, d_input], h: [batch, d_hidden] → [batch, d_hidden]
    pub fn forward(&self, x: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let gi = self.input_gates.forward(x).chunk(3, 1);
        let gh = self.hidden_gates.forward(h.clone()).chunk(3, 1);

        let reset     = sigmoid(gi[0].clone() + gh[0].clone());
        let update    = sigmoid(gi[1].clone() + gh[1].clone());
        let candidate = tanh(gi[2].clone() + reset * gh[2].clone());

        // h' = (1 - z) * n + z * h
        candidate.clone() + update * (h - candidate)
    }
}

/// `num_layers` GRU cells; layer l+1 reads layer l's new state.
#[derive(Module, Debug)]
pub struct StackedGru<B: Backend> {
    cells: Vec<GruCell<B>>,
}

impl<B: Backend> StackedGru<B> {
    pub fn new(d_input: usize, d_hidden: usize, num_layers: usize, device: &B::Device) -> Self {
        let cells = (0..num_layers)
            .map(|l| GruCell::new(if l == 0 { d_input } else { d_hidden }, d_hidden, device))
            .collect();
        Self { cells }
    }

    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    /// One time step through every layer. Returns the new state of each layer.
    pub fn step(&self, x: Tensor<B, 2>, hidden: &[Tensor<B, 2>]) -> Vec<Tensor<B, 2>> {
        let mut input = x;
        let mut next  = Vec::with_capacity(self.cells.len());
        for (cell, h) in self.cells.iter().zip(hidden) {
            let h_new = cell.forward(input, h.clone());
            input = h_new.clone();
            next.push(h_new);
        }
        next
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:  usize,
    pub embed_size:  usize,
    pub hidden_size: usize,
    #[config(default = "1")]
    pub num_layers:  usize,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderRnn<B> {
        EncoderRnn {
            embedding:   EmbeddingConfig::new(self.vocab_size, self.embed_size).init(device),
            rnn:         StackedGru::new(self.embed_size, self.hidden_size, self.num_layers, device),
            hidden_size: self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderRnn<B: Backend> {
    pub embedding:   Embedding<B>,
    pub rnn:         StackedGru<B>,
    pub hidden_size: usize,
}

/// Everything the decoder needs from one encoder pass.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// [batch, src_len, enc_hidden], zero past each sequence's length
    pub outputs: Tensor<B, 3>,
    /// Final state of every layer, each [batch, enc_hidden]
    pub hidden:  Vec<Tensor<B, 2>>,
    /// true where the position is padding — [batch, src_len]
    pub padding: Tensor<B, 2, Bool>,
}

/// 1.0 for real positions, 0.0 for padding — [batch, max_len]
pub fn length_mask<B: Backend>(lengths: &[usize], max_len: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..max_len).map(move |t| if t < len { 1.0 } else { 0.0 }))
        .collect();
    Tensor::from_data(TensorData::new(values, [lengths.len(), max_len]), device)
}

impl<B: Backend> EncoderRnn<B> {
    /// inputs: [batch, src_len]; `lengths[i]` is the true length of row i.
    pub fn forward(&self, inputs: Tensor<B, 2, Int>, lengths: &[usize]) -> EncoderOutput<B> {
        let [batch, src_len] = inputs.dims();
        let device   = inputs.device();
        let embedded = self.embedding.forward(inputs); // [batch, src_len, embed]
        let embed    = embedded.dims()[2];
        let mask     = length_mask::<B>(lengths, src_len, &device);

        let mut hidden: Vec<Tensor<B, 2>> = (0..self.rnn.num_layers())
            .map(|_| Tensor::zeros([batch, self.hidden_size], &device))
            .collect();
        let mut outputs = Vec::with_capacity(src_len);

        for t in 0..src_len {
            let x = embedded.clone().slice([0..batch, t..t + 1, 0..embed]).reshape([batch, embed]);
            let m = mask.clone().slice([0..batch, t..t + 1]); // [batch, 1]

            let stepped = self.rnn.step(x, &hidden);
            // Past the end of a sequence, keep the previous state
            hidden = hidden
                .into_iter()
                .zip(stepped)
                .map(|(old, new)| old.clone() + (new - old) * m.clone())
                .collect();

            let top = hidden[hidden.len() - 1].clone();
            outputs.push(top * m);
        }

        EncoderOutput {
            outputs: Tensor::stack(outputs, 1),
            hidden,
            padding: mask.lower_elem(0.5),
        }
    }
}

// ─── Decoder ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DecoderConfig {
    pub vocab_size:     usize,
    pub embed_size:     usize,
    pub hidden_size:    usize,
    pub encoder_hidden: usize,
    #[config(default = "1")]
    pub num_layers:     usize,
}

impl DecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderRnn<B> {
        DecoderRnn {
            embedding: EmbeddingConfig::new(self.vocab_size, self.embed_size).init(device),
            bridge:    LinearConfig::new(self.encoder_hidden, self.hidden_size).init(device),
            rnn:       StackedGru::new(
                self.embed_size + self.encoder_hidden,
                self.hidden_size,
                self.num_layers,
                device,
            ),
            attention: LinearConfig::new(self.hidden_size, self.encoder_hidden)
                .with_bias(false)
                .init(device),
            output:    LinearConfig::new(self.hidden_size + self.encoder_hidden, self.vocab_size)
                .init(device),
            encoder_hidden: self.encoder_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct DecoderRnn<B: Backend> {
    pub embedding:      Embedding<B>,
    /// encoder final state → decoder initial state (every layer)
    pub bridge:         Linear<B>,
    pub rnn:            StackedGru<B>,
    /// Luong "general" score: h_dec · W · h_enc
    pub attention:      Linear<B>,
    pub output:         Linear<B>,
    pub encoder_hidden: usize,
}

/// Recurrent state carried between decoder steps.
#[derive(Debug, Clone)]
pub struct DecoderState<B: Backend> {
    pub hidden:  Vec<Tensor<B, 2>>,
    /// Attention context from the previous step — [batch, enc_hidden]
    pub context: Tensor<B, 2>,
}

impl<B: Backend> DecoderRnn<B> {
    pub fn init_state(&self, encoded: &EncoderOutput<B>) -> DecoderState<B> {
        let [batch, _, _] = encoded.outputs.dims();
        let device = encoded.outputs.device();
        let hidden = encoded
            .hidden
            .iter()
            .map(|h| tanh(self.bridge.forward(h.clone())))
            .collect();
        DecoderState {
            hidden,
            context: Tensor::zeros([batch, self.encoder_hidden], &device),
        }
    }

    /// One decoding step. tokens: [batch] → logits [batch, vocab].
    pub fn step(
        &self,
        tokens:  Tensor<B, 1, Int>,
        state:   DecoderState<B>,
        encoded: &EncoderOutput<B>,
    ) -> (Tensor<B, 2>, DecoderState<B>) {
        let [batch] = tokens.dims();
        let [_, src_len, enc_hidden] = encoded.outputs.dims();

        let embedded = self.embedding.forward(tokens.reshape([batch, 1]));
        let embed    = embedded.dims()[2];
        let x = Tensor::cat(vec![embedded.reshape([batch, embed]), state.context], 1);

        let hidden = self.rnn.step(x, &state.hidden);
        let top    = hidden[hidden.len() - 1].clone();

        // ── Attention over encoder outputs ───────────────────────────────────
        let query  = self.attention.forward(top.clone()).reshape([batch, enc_hidden, 1]);
        let scores = encoded
            .outputs
            .clone()
            .matmul(query)
            .reshape([batch, src_len])
            .mask_fill(encoded.padding.clone(), -1.0e9);
        let weights = softmax(scores, 1).reshape([batch, 1, src_len]);
        let context = weights
            .matmul(encoded.outputs.clone())
            .reshape([batch, enc_hidden]);

        let logits = self.output.forward(Tensor::cat(vec![top, context.clone()], 1));
        (logits, DecoderState { hidden, context })
    }

    /// Teacher-forced pass. inputs: [batch, trg_len] → [batch, trg_len, vocab]
    pub fn forward(&self, inputs: Tensor<B, 2, Int>, encoded: &EncoderOutput<B>) -> Tensor<B, 3> {
        let [batch, trg_len] = inputs.dims();
        let mut state  = self.init_state(encoded);
        let mut logits = Vec::with_capacity(trg_len);

        for t in 0..trg_len {
            let tokens = inputs.clone().slice([0..batch, t..t + 1]).reshape([batch]);
            let (step_logits, next) = self.step(tokens, state, encoded);
            logits.push(step_logits);
            state = next;
        }

        Tensor::stack(logits, 1)
    }
}

// ─── Model pair ───────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    pub src_vocab_size:      usize,
    pub trg_vocab_size:      usize,
    pub encoder_embed_size:  usize,
    pub encoder_hidden_size: usize,
    pub decoder_embed_size:  usize,
    pub decoder_hidden_size: usize,
    #[config(default = "1")]
    pub num_layers:          usize,
}

impl Seq2SeqConfig {
    pub fn encoder(&self) -> EncoderConfig {
        EncoderConfig::new(self.src_vocab_size, self.encoder_embed_size, self.encoder_hidden_size)
            .with_num_layers(self.num_layers)
    }

    pub fn decoder(&self) -> DecoderConfig {
        DecoderConfig::new(
            self.trg_vocab_size,
            self.decoder_embed_size,
            self.decoder_hidden_size,
            self.encoder_hidden_size,
        )
        .with_num_layers(self.num_layers)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Seq2Seq<B> {
        Seq2Seq {
            encoder: self.encoder().init(device),
            decoder: self.decoder().init(device),
        }
    }
}

/// Encoder and decoder as one module, so one optimiser steps both.
#[derive(Module, Debug)]
pub struct Seq2Seq<B: Backend> {
    pub encoder: EncoderRnn<B>,
    pub decoder: DecoderRnn<B>,
}

impl<B: Backend> Seq2Seq<B> {
    /// Teacher-forced logits for `decoder_inputs` given the source batch.
    pub fn forward(
        &self,
        src:            Tensor<B, 2, Int>,
        src_lengths:    &[usize],
        decoder_inputs: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let encoded = self.encoder.forward(src, src_lengths);
        self.decoder.forward(decoder_inputs, &encoded)
    }
}
