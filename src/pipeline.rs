//! Per-connection pipeline assembly.
//!
//! [`PipelineFactory`] holds an immutable list of stages and builds a fresh
//! [`Pipeline`] for every accepted connection: the shared diagnostic stages
//! first, then exactly one framing stage with its own decoder and encoder.
//! The request handler is attached afterwards by the listener as the
//! terminal consumer.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    codec::FrameCodec,
    connection::ConnectionId,
    diagnostics::DiagnosticStage,
    observed_stream::DiagnosticChain,
};

/// Name recorded for the framing stage.
pub const FRAMING_STAGE: &str = "frame-decoder";

/// Role of a stage within a connection pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Observes raw bytes; may repeat.
    Diagnostic,
    /// Splits bytes into frames; exactly once.
    Framing,
    /// Consumes frames; at most once, always last.
    Handler,
}

/// Name and role of one installed stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageDescriptor {
    /// Stage name.
    pub name: &'static str,
    /// Stage role.
    pub kind: StageKind,
}

impl StageDescriptor {
    const fn new(name: &'static str, kind: StageKind) -> Self { Self { name, kind } }
}

/// Violations of the stage ordering rules.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The chain has no framing stage or more than one.
    #[error("pipeline must contain exactly one framing stage, found {0}")]
    FramingCount(usize),
    /// A diagnostic stage follows the framing stage.
    #[error("diagnostic stage {0:?} installed after framing")]
    DiagnosticAfterFraming(&'static str),
    /// A handler is present more than once or is not the last stage.
    #[error("handler stage {0:?} must be the single terminal stage")]
    MisplacedHandler(&'static str),
}

/// Check that `stages` holds diagnostics, then one framing stage, then at
/// most one handler.
///
/// # Errors
/// Returns the first [`PipelineError`] found.
pub fn validate(stages: &[StageDescriptor]) -> Result<(), PipelineError> {
    let framing = stages
        .iter()
        .filter(|s| s.kind == StageKind::Framing)
        .count();
    if framing != 1 {
        return Err(PipelineError::FramingCount(framing));
    }
    let mut seen_framing = false;
    for (i, stage) in stages.iter().enumerate() {
        match stage.kind {
            StageKind::Diagnostic if seen_framing => {
                return Err(PipelineError::DiagnosticAfterFraming(stage.name));
            }
            StageKind::Diagnostic => {}
            StageKind::Framing => seen_framing = true,
            StageKind::Handler if !seen_framing || i + 1 != stages.len() => {
                return Err(PipelineError::MisplacedHandler(stage.name));
            }
            StageKind::Handler => {}
        }
    }
    Ok(())
}

/// Builds one pipeline per accepted connection.
pub struct PipelineFactory<C: FrameCodec> {
    diagnostics: DiagnosticChain,
    codec: C,
}

impl<C: FrameCodec> Clone for PipelineFactory<C> {
    fn clone(&self) -> Self {
        Self {
            diagnostics: Arc::clone(&self.diagnostics),
            codec: self.codec.clone(),
        }
    }
}

impl<C: FrameCodec> PipelineFactory<C> {
    /// Create a factory framing connections with `codec` and no diagnostics.
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self {
            diagnostics: Arc::from(Vec::new()),
            codec,
        }
    }

    /// Append a diagnostic stage, shared by every connection.
    #[must_use]
    pub fn with_diagnostic<D: DiagnosticStage>(mut self, stage: D) -> Self {
        let mut stages = self.diagnostics.to_vec();
        stages.push(Arc::new(stage));
        self.diagnostics = Arc::from(stages);
        self
    }

    /// Build the pipeline for a newly accepted connection.
    ///
    /// Call exactly once per connection, before any bytes are read.
    #[must_use]
    pub fn initialize(&self, id: ConnectionId) -> Pipeline<C> {
        let mut stages: Vec<StageDescriptor> = self
            .diagnostics
            .iter()
            .map(|d| StageDescriptor::new(d.name(), StageKind::Diagnostic))
            .collect();
        stages.push(StageDescriptor::new(FRAMING_STAGE, StageKind::Framing));
        debug_assert_eq!(validate(&stages), Ok(()));
        Pipeline {
            id,
            stages,
            diagnostics: Arc::clone(&self.diagnostics),
            decoder: self.codec.decoder(),
            encoder: self.codec.encoder(),
        }
    }
}

impl<C: FrameCodec> fmt::Debug for PipelineFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.diagnostics.iter().map(|d| d.name()).collect();
        f.debug_struct("PipelineFactory")
            .field("diagnostics", &names)
            .finish_non_exhaustive()
    }
}

/// Stage chain owned by a single connection.
pub struct Pipeline<C: FrameCodec> {
    id: ConnectionId,
    stages: Vec<StageDescriptor>,
    diagnostics: DiagnosticChain,
    decoder: C::Decoder,
    encoder: C::Encoder,
}

pub(crate) struct PipelineParts<C: FrameCodec> {
    pub id: ConnectionId,
    pub stages: Vec<StageDescriptor>,
    pub diagnostics: DiagnosticChain,
    pub decoder: C::Decoder,
    pub encoder: C::Encoder,
}

impl<C: FrameCodec> Pipeline<C> {
    /// Connection this pipeline belongs to.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Installed stages in order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] { &self.stages }

    /// Register the terminal handler stage.
    ///
    /// # Errors
    /// Returns [`PipelineError::MisplacedHandler`] if a handler is already
    /// attached.
    pub fn attach_handler(&mut self, name: &'static str) -> Result<(), PipelineError> {
        if self.stages.iter().any(|s| s.kind == StageKind::Handler) {
            return Err(PipelineError::MisplacedHandler(name));
        }
        self.stages.push(StageDescriptor::new(name, StageKind::Handler));
        Ok(())
    }

    pub(crate) fn into_parts(self) -> PipelineParts<C> {
        PipelineParts {
            id: self.id,
            stages: self.stages,
            diagnostics: self.diagnostics,
            decoder: self.decoder,
            encoder: self.encoder,
        }
    }
}

impl<C: FrameCodec> fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}
