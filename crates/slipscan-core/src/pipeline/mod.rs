//! Per-document orchestration: OCR, classify, extract, rename, deduplicate.
//!
//! Documents run one at a time. A failing document is recorded as an error
//! result and the batch moves on; the ledger is only appended to after a
//! document completed extraction.

pub mod rename;

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::classify::{TextClassifier, build_classifier};
use crate::error::{OcrError, Result, SlipscanError};
use crate::export::ResultExporter;
use crate::extract::{CompiledSchema, FieldExtractor};
use crate::fingerprint::file_sha256;
use crate::ledger::{LedgerEntry, ProcessingLedger};
use crate::models::config::{InputConfig, OcrConfig, SlipscanConfig};
use crate::models::{DocumentType, ExtractedFields, ProcessingResult};
use crate::normalize::normalize;
use crate::ocr::{OcrEngine, PageRenderer, RawPage, build_engine, build_renderer};

/// What happened to one document of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Appended to the ledger and queued for export.
    Recorded,
    /// Already in the ledger; not appended, not exported.
    Duplicate,
    /// Processing failed; retried on the next run.
    Failed,
}

/// One document's result within a batch.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    /// Path the document was read from.
    pub path: PathBuf,
    pub result: ProcessingResult,
    pub status: OutcomeStatus,
}

/// Results of a batch, in processing order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DocumentOutcome>,
    /// Ledger length before the batch appended anything.
    ledger_start: usize,
}

impl BatchReport {
    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn recorded(&self) -> usize {
        self.count(OutcomeStatus::Recorded)
    }

    pub fn duplicates(&self) -> usize {
        self.count(OutcomeStatus::Duplicate)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    /// Failed documents.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
    }

    /// Recorded results, ready for the exporter.
    pub fn exportable(&self) -> Vec<ProcessingResult> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Recorded)
            .map(|o| o.result.clone())
            .collect()
    }

    /// Export the recorded results to `destination`. Returns `None` when
    /// nothing was recorded.
    ///
    /// When the export fails, the batch's ledger entries are dropped again so
    /// its documents are picked up by the next run, and the export error is
    /// returned.
    pub fn export(
        &self,
        exporter: &dyn ResultExporter,
        destination: &Path,
        ledger: &mut ProcessingLedger,
    ) -> Result<Option<PathBuf>> {
        let exportable = self.exportable();
        if exportable.is_empty() {
            return Ok(None);
        }

        match exporter.export(&exportable, destination) {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                error!("Export to {} failed: {}", destination.display(), e);
                for result in &exportable {
                    error!("Not exported: {}", result.original_name);
                }
                match ledger.truncate(self.ledger_start) {
                    Ok(dropped) => warn!(
                        "Removed {} unexported documents from the ledger; they are retried on the next run",
                        dropped.len()
                    ),
                    Err(ledger_error) => error!(
                        "Failed to remove unexported documents from {}: {}",
                        ledger.path().display(),
                        ledger_error
                    ),
                }
                Err(e.into())
            }
        }
    }
}

/// The document pipeline.
pub struct Pipeline {
    renderer: Box<dyn PageRenderer>,
    engine: Box<dyn OcrEngine>,
    classifier: Box<dyn TextClassifier>,
    extractor: FieldExtractor,
    ocr: OcrConfig,
    scan_all_pages: bool,
    rename: bool,
}

impl Pipeline {
    /// Pipeline over explicit OCR and classifier implementations, with
    /// default OCR options.
    pub fn new(
        renderer: Box<dyn PageRenderer>,
        engine: Box<dyn OcrEngine>,
        classifier: Box<dyn TextClassifier>,
    ) -> Self {
        Self {
            renderer,
            engine,
            classifier,
            extractor: FieldExtractor::new(),
            ocr: OcrConfig::default(),
            scan_all_pages: true,
            rename: true,
        }
    }

    /// Build every component from configuration.
    pub fn from_config(config: &SlipscanConfig) -> Result<Self> {
        let renderer = build_renderer(&config.ocr);
        let engine = build_engine(&config.ocr)?;
        let classifier = build_classifier(&config.classification);

        Ok(Self::new(renderer, engine, classifier)
            .with_ocr_config(config.ocr.clone())
            .with_extractor(FieldExtractor::new().with_token_window(config.extraction.token_window))
            .with_scan_all_pages(config.extraction.scan_all_pages))
    }

    pub fn with_ocr_config(mut self, ocr: OcrConfig) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn with_extractor(mut self, extractor: FieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Keep scanning pages after the first usable one to fill missing fields.
    pub fn with_scan_all_pages(mut self, scan_all_pages: bool) -> Self {
        self.scan_all_pages = scan_all_pages;
        self
    }

    /// Rename documents with their type suffix (on by default).
    pub fn with_rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    /// Check both sides of the OCR boundary. Returns the engine version.
    pub fn probe(&self) -> std::result::Result<String, OcrError> {
        let renderer = self.renderer.probe()?;
        let engine = self.engine.probe()?;
        debug!("Renderer: {}, engine: {}", renderer, engine);
        Ok(engine)
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Process one document. Failures become an error result.
    pub fn process_document(&self, path: &Path) -> ProcessingResult {
        let name = file_name(path);
        info!("Processing {}", name);

        match self.try_process(path, &name) {
            Ok(result) => {
                info!("{}: {} ({} fields)", name, result.doc_type, result.fields.len());
                result
            }
            Err(e) => {
                error!("Failed to process {}: {}", name, e);
                ProcessingResult::failed(name, e.to_string())
            }
        }
    }

    fn try_process(&self, path: &Path, name: &str) -> Result<ProcessingResult> {
        let (doc_type, fields) = self.classify_and_extract(path)?;

        let renamed_name = if self.rename {
            let renamed = rename::rename_with_type(path, doc_type)?;
            file_name(&renamed)
        } else {
            name.to_string()
        };

        Ok(ProcessingResult {
            original_name: name.to_string(),
            renamed_name,
            doc_type,
            fields,
            error: None,
        })
    }

    /// OCR the bounded pages, classify on the first page with text and
    /// extract fields from it and, when enabled, the following pages.
    pub fn classify_and_extract(&self, path: &Path) -> Result<(DocumentType, ExtractedFields)> {
        let max_pages = self.ocr.max_pages.max(1);
        let images = self.renderer.render_pages(path, max_pages)?;
        debug!("{} page images for {}", images.len(), path.display());

        let mut classified: Option<&CompiledSchema> = None;
        let mut fields = ExtractedFields::new();
        let mut complete = false;

        for (index, image) in images.iter().take(max_pages).enumerate() {
            if classified.is_some() && (complete || !self.scan_all_pages) {
                break;
            }

            let page = RawPage {
                index,
                text: self.engine.image_to_text(
                    image,
                    &self.ocr.language,
                    self.ocr.page_segmentation_mode,
                )?,
            };
            let text = normalize(&page.text);
            if text.is_empty() {
                debug!("Page {} has no text", page.index + 1);
                continue;
            }

            let schema = match classified {
                Some(schema) => schema,
                None => {
                    let doc_type = self.classifier.classify(&text);
                    debug!(
                        "Page {} classified as {} by {}",
                        page.index + 1,
                        doc_type,
                        self.classifier.name()
                    );
                    let schema = self.extractor.schema(doc_type);
                    classified = Some(schema);
                    schema
                }
            };
            complete = schema.merge_page(&mut fields, &text);
        }

        let schema = match classified {
            Some(schema) => schema,
            None => {
                warn!("No text found in {}", path.display());
                self.extractor.schema(self.classifier.classify(""))
            }
        };

        Ok((schema.doc_type(), schema.finish(fields)))
    }

    /// Process `paths` in order against the ledger.
    ///
    /// Duplicates (same natural key or same content digest) are skipped;
    /// other successes are appended to the ledger. `on_done` sees each
    /// outcome as it completes.
    pub fn run_batch(
        &self,
        paths: &[PathBuf],
        ledger: &mut ProcessingLedger,
        mut on_done: impl FnMut(&DocumentOutcome),
    ) -> BatchReport {
        let mut report = BatchReport {
            outcomes: Vec::new(),
            ledger_start: ledger.len(),
        };

        for path in paths {
            let outcome = self.run_one(path, ledger);
            on_done(&outcome);
            report.outcomes.push(outcome);
        }

        info!(
            "Batch done: {} recorded, {} duplicates, {} failed",
            report.recorded(),
            report.duplicates(),
            report.failed()
        );
        report
    }

    fn run_one(&self, path: &Path, ledger: &mut ProcessingLedger) -> DocumentOutcome {
        let outcome = |result: ProcessingResult, status| DocumentOutcome {
            path: path.to_path_buf(),
            result,
            status,
        };

        let sha256 = match file_sha256(path) {
            Ok(sha) => sha,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                let result = ProcessingResult::failed(file_name(path), e.to_string());
                return outcome(result, OutcomeStatus::Failed);
            }
        };

        let result = self.process_document(path);
        if result.is_error() {
            return outcome(result, OutcomeStatus::Failed);
        }

        if ledger.contains(result.doc_type, &result.fields) || ledger.contains_fingerprint(&sha256) {
            info!("{} already recorded, skipping", result.original_name);
            return outcome(result, OutcomeStatus::Duplicate);
        }

        match ledger.append(LedgerEntry::from_result(&result, Some(sha256))) {
            Ok(()) => outcome(result, OutcomeStatus::Recorded),
            Err(e) => {
                error!("Failed to record {}: {}", result.original_name, e);
                let failed = ProcessingResult {
                    error: Some(SlipscanError::from(e).to_string()),
                    ..result
                };
                outcome(failed, OutcomeStatus::Failed)
            }
        }
    }
}

/// Input documents of a directory, sorted by file name.
pub fn collect_inputs(dir: &Path, input: &InputConfig) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && input.accepts(p))
        .collect();
    paths.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::export::CsvExporter;
    use crate::models::FieldValue;
    use crate::models::config::UnknownPolicy;
    use image::{DynamicImage, GrayImage};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads fixture files whose pages are separated by form feeds and
    /// carries each page's text in the pixel bytes.
    struct TextRenderer;

    impl PageRenderer for TextRenderer {
        fn render_pages(&self, path: &Path, max_pages: usize) -> std::result::Result<Vec<DynamicImage>, OcrError> {
            let content = std::fs::read_to_string(path)?;
            if content.starts_with("CORRUPT") {
                return Err(OcrError::Render("broken xref table".to_string()));
            }
            Ok(content
                .split('\x0c')
                .take(max_pages)
                .map(|page| {
                    let mut bytes = page.as_bytes().to_vec();
                    bytes.push(0);
                    let width = bytes.len() as u32;
                    DynamicImage::ImageLuma8(GrayImage::from_raw(width, 1, bytes).unwrap())
                })
                .collect())
        }
    }

    /// Decodes the page text back and counts calls.
    struct TextOcr {
        calls: Arc<AtomicUsize>,
    }

    impl OcrEngine for TextOcr {
        fn image_to_text(&self, image: &DynamicImage, _language: &str, _mode: u8) -> std::result::Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut bytes = image.to_luma8().into_raw();
            bytes.pop();
            let text = String::from_utf8(bytes).unwrap();
            if text.contains("<<FAIL>>") {
                return Err(OcrError::Recognition("engine crashed".to_string()));
            }
            Ok(text)
        }

        fn probe(&self) -> std::result::Result<String, OcrError> {
            Ok("fake 1.0".to_string())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn pipeline_with(policy: UnknownPolicy) -> (Pipeline, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(
            Box::new(TextRenderer),
            Box::new(TextOcr { calls: calls.clone() }),
            Box::new(KeywordClassifier::new().with_unknown_policy(policy)),
        );
        (pipeline, calls)
    }

    fn pipeline() -> Pipeline {
        pipeline_with(UnknownPolicy::Permissive).0
    }

    const SLIP: &str = "Banco X  Linha Digitável 23790.12345\nVencimento 10/11/2025\nNúmero do Documento 00123";
    const INVOICE: &str = "PREFEITURA MUNICIPAL\nNota Fiscal de Serviço\nNúmero da Nota 4521\nData e Hora de Emissão 03/10/2025 14:22:05\nValor Total da Nota R$ 1.250,00";

    #[test]
    fn test_slip_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boleto.pdf");
        std::fs::write(&path, SLIP).unwrap();

        let result = pipeline().process_document(&path);

        assert_eq!(result.error, None);
        assert_eq!(result.doc_type, DocumentType::PaymentSlip);
        assert_eq!(result.original_name, "boleto.pdf");
        assert_eq!(result.renamed_name, "boleto_BOLETO.pdf");
        assert_eq!(result.fields.found("Vencimento"), Some("10/11/2025"));
        assert_eq!(result.fields.found("Número do Documento"), Some("00123"));
        assert_eq!(result.fields.get("Valor do Documento"), Some(&FieldValue::NotFound));
        assert!(dir.path().join("boleto_BOLETO.pdf").exists());
    }

    #[test]
    fn test_classifies_on_first_page_with_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nf.pdf");
        // Blank first page, invoice on the second, slip words on the third.
        std::fs::write(&path, format!("  \n\x0c{}\x0cLinha Digitável", INVOICE)).unwrap();

        let (pipeline, _) = pipeline_with(UnknownPolicy::Strict);
        let pipeline = pipeline.with_ocr_config(OcrConfig {
            max_pages: 3,
            ..Default::default()
        });
        let (doc_type, fields) = pipeline.classify_and_extract(&path).unwrap();

        assert_eq!(doc_type, DocumentType::Invoice);
        assert_eq!(fields.found("Número da Nota"), Some("4521"));
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn test_later_page_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.pdf");
        std::fs::write(&path, format!("{}\x0cValor do Documento 150,00", SLIP)).unwrap();

        let (doc_type, fields) = pipeline().classify_and_extract(&path).unwrap();
        assert_eq!(doc_type, DocumentType::PaymentSlip);
        assert_eq!(fields.found("Valor do Documento"), Some("150,00"));

        let (_, first_only) = pipeline()
            .with_scan_all_pages(false)
            .classify_and_extract(&path)
            .unwrap();
        assert_eq!(first_only.get("Valor do Documento"), Some(&FieldValue::NotFound));
    }

    #[test]
    fn test_ocr_is_bounded_and_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.pdf");
        let complete = format!("{} Valor do Documento 9,99", SLIP);
        std::fs::write(&path, format!("{}\x0cpage 2\x0cpage 3", complete)).unwrap();

        let (pipeline, calls) = pipeline_with(UnknownPolicy::Permissive);
        pipeline.classify_and_extract(&path).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Two blank pages fill the bound; the slip words on page 3 are never read.
        std::fs::write(&path, "\x0c \x0cLinha Digitável").unwrap();
        let (pipeline, calls) = pipeline_with(UnknownPolicy::Strict);
        let (doc_type, _) = pipeline.classify_and_extract(&path).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(doc_type, DocumentType::Unknown);
    }

    #[test]
    fn test_failures_become_error_results() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt = dir.path().join("a.pdf");
        std::fs::write(&corrupt, "CORRUPT").unwrap();
        let crashing = dir.path().join("b.pdf");
        std::fs::write(&crashing, "<<FAIL>>").unwrap();

        let result = pipeline().process_document(&corrupt);
        assert!(result.type_label().starts_with("ERRO: "));
        assert!(corrupt.exists());

        let result = pipeline().process_document(&crashing);
        assert!(result.is_error());
        assert_eq!(result.renamed_name, "b.pdf");
    }

    #[test]
    fn test_batch_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("01.pdf"), SLIP).unwrap();
        std::fs::write(input.join("02.pdf"), INVOICE).unwrap();
        std::fs::write(input.join("03.pdf"), "CORRUPT").unwrap();
        // Strict policy: unknown type with no natural key.
        std::fs::write(input.join("04.pdf"), "comprovante sem indicadores").unwrap();
        std::fs::write(input.join("notes.txt"), SLIP).unwrap();

        let ledger_path = dir.path().join("arquivos_processados.log");
        let export_path = dir.path().join("resultados_pdfs.csv");
        let (pipeline, _) = pipeline_with(UnknownPolicy::Strict);

        let mut ledger = ProcessingLedger::load(&ledger_path).unwrap();
        let paths = collect_inputs(&input, &InputConfig::default()).unwrap();
        assert_eq!(paths.len(), 4);

        let mut seen = Vec::new();
        let report = pipeline.run_batch(&paths, &mut ledger, |o| seen.push(o.status));
        assert_eq!(report.recorded(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(seen.len(), 4);
        CsvExporter::new().export(&report.exportable(), &export_path).unwrap();

        let ledger_before = std::fs::read_to_string(&ledger_path).unwrap();
        let export_before = std::fs::read_to_string(&export_path).unwrap();
        assert_eq!(ledger_before.lines().count(), 3);
        assert_eq!(export_before.lines().count(), 4);

        // Second run over the renamed files.
        let mut ledger = ProcessingLedger::load(&ledger_path).unwrap();
        let paths = collect_inputs(&input, &InputConfig::default()).unwrap();
        let report = pipeline.run_batch(&paths, &mut ledger, |_| {});
        assert_eq!(report.recorded(), 0);
        assert_eq!(report.duplicates(), 3);
        assert_eq!(report.failed(), 1);
        CsvExporter::new().export(&report.exportable(), &export_path).unwrap();

        assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), ledger_before);
        assert_eq!(std::fs::read_to_string(&export_path).unwrap(), export_before);
    }

    #[test]
    fn test_same_document_twice_in_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), SLIP).unwrap();
        std::fs::write(dir.path().join("b.pdf"), format!("{}\n", SLIP)).unwrap();

        let mut ledger = ProcessingLedger::load(dir.path().join("log")).unwrap();
        let paths = collect_inputs(dir.path(), &InputConfig::default()).unwrap();
        let report = pipeline().run_batch(&paths, &mut ledger, |_| {});

        assert_eq!(report.recorded(), 1);
        assert_eq!(report.duplicates(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_failed_export_rolls_back_batch() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("01.pdf"), SLIP).unwrap();

        let ledger_path = dir.path().join("arquivos_processados.log");
        let mut ledger = ProcessingLedger::load(&ledger_path).unwrap();
        let paths = collect_inputs(&input, &InputConfig::default()).unwrap();
        let report = pipeline().run_batch(&paths, &mut ledger, |_| {});
        assert_eq!(report.recorded(), 1);

        // A directory in place of the export file.
        let blocked = dir.path().join("resultados_pdfs.csv");
        std::fs::create_dir(&blocked).unwrap();
        let err = report
            .export(&CsvExporter::new(), &blocked, &mut ledger)
            .unwrap_err();
        assert!(matches!(err, SlipscanError::Export(_)));
        assert!(ledger.is_empty());
        assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), "");

        // The next run records and exports the document.
        let export_path = dir.path().join("out.csv");
        let mut ledger = ProcessingLedger::load(&ledger_path).unwrap();
        let paths = collect_inputs(&input, &InputConfig::default()).unwrap();
        let report = pipeline().run_batch(&paths, &mut ledger, |_| {});
        assert_eq!(report.recorded(), 1);
        assert_eq!(
            report.export(&CsvExporter::new(), &export_path, &mut ledger).unwrap(),
            Some(export_path.clone())
        );
        assert_eq!(ledger.len(), 1);
        assert!(std::fs::read_to_string(&export_path).unwrap().contains("01_BOLETO.pdf"));
    }

    #[test]
    fn test_empty_batch_exports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ProcessingLedger::load(dir.path().join("log")).unwrap();
        let report = pipeline().run_batch(&[], &mut ledger, |_| {});
        let path = dir.path().join("out.csv");

        assert_eq!(report.export(&CsvExporter::new(), &path, &mut ledger).unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_extractor_window_reaches_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.pdf");
        std::fs::write(&path, "Linha Digitável Vencimento a b c d e f g 05/12/2025").unwrap();

        let (_, fields) = pipeline().classify_and_extract(&path).unwrap();
        assert_eq!(fields.get("Vencimento"), Some(&FieldValue::NotFound));

        let (_, fields) = pipeline()
            .with_extractor(FieldExtractor::new().with_token_window(8))
            .classify_and_extract(&path)
            .unwrap();
        assert_eq!(fields.found("Vencimento"), Some("05/12/2025"));
    }

    #[test]
    fn test_probe_reports_engine_version() {
        assert_eq!(pipeline().probe().unwrap(), "fake 1.0");
    }
}
