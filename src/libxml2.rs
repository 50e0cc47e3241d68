//! LibXML2 FFI wrapper for XSD compilation and document validation.
//!
//! No mature pure Rust crate validates against XML Schema, so the schema
//! check goes through libxml2 directly. Compiled schemas are read-only after
//! construction and shared across threads; each validation builds its own
//! validation context.
//!
//! Schema parsing in libxml2 is not thread-safe. All parses are serialized
//! behind [`SCHEMA_PARSE_LOCK`]; validation runs fully in parallel.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, Once};

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};

static LIBXML2_INIT: Once = Once::new();

/// Serializes calls into the libxml2 schema parser
static SCHEMA_PARSE_LOCK: Mutex<()> = Mutex::new(());

const XML_PARSE_NOERROR: c_int = 1 << 5;
const XML_PARSE_NOWARNING: c_int = 1 << 6;
const XML_PARSE_NONET: c_int = 1 << 11;

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);

    pub fn xmlSchemaNewDocParserCtxt(doc: *mut XmlDoc) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    pub fn xmlSchemaNewValidCtxt(schema: *mut XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

/// One message reported by libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// Line in the checked document, when libxml2 knows it
    pub line: Option<u32>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {})", self.message, line),
            None => f.write_str(&self.message),
        }
    }
}

/// Collects structured errors into the `Vec<Diagnostic>` behind `user_data`
unsafe extern "C" fn collect_diagnostic(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let diagnostics = unsafe { &mut *(user_data as *mut Vec<Diagnostic>) };
    let error = unsafe { &*error };

    if error.message.is_null() {
        return;
    }
    let message = unsafe { CStr::from_ptr(error.message) }
        .to_string_lossy()
        .trim()
        .to_string();
    let line = u32::try_from(error.line).ok().filter(|line| *line > 0);

    diagnostics.push(Diagnostic { message, line });
}

/// Shared handle to a compiled schema
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    schema: *mut XmlSchema,
    /// Schema document; libxml2 keeps pointers into it for the schema's lifetime
    doc: *mut XmlDoc,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: compiled schemas are only read after construction, which libxml2
// supports from multiple threads as long as each uses its own valid context.
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    fn as_ptr(&self) -> *mut XmlSchema {
        self.inner.schema
    }

    /// True when both handles point at the same compiled schema
    pub fn ptr_eq(&self, other: &XmlSchemaPtr) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        unsafe {
            if !self.schema.is_null() {
                xmlSchemaFree(self.schema);
                self.schema = std::ptr::null_mut();
            }
            if !self.doc.is_null() {
                xmlFreeDoc(self.doc);
                self.doc = std::ptr::null_mut();
            }
        }
    }
}

/// Owned libxml2 document, freed on drop
struct ParsedDoc(*mut XmlDoc);

impl ParsedDoc {
    fn read(content: &[u8], url: &str, options: c_int) -> LibXml2Result<Self> {
        let size = c_int::try_from(content.len()).map_err(|_| LibXml2Error::InvalidXml {
            details: "document too large".to_string(),
        })?;
        let url = CString::new(url).map_err(|_| LibXml2Error::InvalidXml {
            details: "document name contains a NUL byte".to_string(),
        })?;

        let doc = unsafe {
            xmlReadMemory(
                content.as_ptr() as *const c_char,
                size,
                url.as_ptr(),
                std::ptr::null(),
                options,
            )
        };
        if doc.is_null() {
            return Err(LibXml2Error::InvalidXml {
                details: "libxml2 could not parse the document".to_string(),
            });
        }
        Ok(ParsedDoc(doc))
    }

    fn into_raw(self) -> *mut XmlDoc {
        let doc = self.0;
        std::mem::forget(self);
        doc
    }
}

impl Drop for ParsedDoc {
    fn drop(&mut self) {
        unsafe { xmlFreeDoc(self.0) };
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { diagnostics: Vec<Diagnostic> },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Diagnostics in the order libxml2 reported them
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid { diagnostics } => diagnostics,
        }
    }
}

/// Safe entry point to libxml2 schema handling
#[derive(Debug, Clone, Copy)]
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile an XSD held in memory.
    ///
    /// `base_url` is the location the schema came from; relative
    /// `xs:include` / `xs:import` references resolve against it.
    pub fn parse_schema(&self, schema_data: &[u8], base_url: &str) -> LibXml2Result<XmlSchemaPtr> {
        let _guard = SCHEMA_PARSE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let doc = ParsedDoc::read(
            schema_data,
            base_url,
            XML_PARSE_NOERROR | XML_PARSE_NOWARNING,
        )
        .map_err(|e| LibXml2Error::SchemaParseFailed {
            details: e.to_string(),
        })?;

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        unsafe {
            let parser_ctxt = xmlSchemaNewDocParserCtxt(doc.0);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }
            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(collect_diagnostic),
                &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
            );

            let schema = xmlSchemaParse(parser_ctxt);
            xmlSchemaFreeParserCtxt(parser_ctxt);

            if schema.is_null() {
                let details = if diagnostics.is_empty() {
                    "not a valid XML Schema".to_string()
                } else {
                    join_diagnostics(&diagnostics)
                };
                return Err(LibXml2Error::SchemaParseFailed { details });
            }

            Ok(XmlSchemaPtr {
                inner: Arc::new(XmlSchemaInner {
                    schema,
                    doc: doc.into_raw(),
                    _phantom: PhantomData,
                }),
            })
        }
    }

    /// Validate an in-memory document against a compiled schema.
    ///
    /// Safe to call concurrently with the same schema.
    pub fn validate_memory(
        &self,
        schema: &XmlSchemaPtr,
        content: &[u8],
        name: &str,
    ) -> LibXml2Result<ValidationResult> {
        let doc = ParsedDoc::read(
            content,
            name,
            XML_PARSE_NOERROR | XML_PARSE_NOWARNING | XML_PARSE_NONET,
        )?;

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let code = unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(collect_diagnostic),
                &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
            );

            let code = xmlSchemaValidateDoc(valid_ctxt, doc.0);
            xmlSchemaFreeValidCtxt(valid_ctxt);
            code
        };

        match code {
            0 => Ok(ValidationResult::Valid),
            n if n > 0 => Ok(ValidationResult::Invalid { diagnostics }),
            n => Err(LibXml2Error::InternalError { code: n }),
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}

/// `"a (line 3); b"` style summary of several diagnostics
pub fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
