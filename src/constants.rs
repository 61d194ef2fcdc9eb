//! Nombres de partes, espacios de nombres y tipos de contenido conocidos.

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const ROOT_RELS_PART: &str = "_rels/.rels";
pub const APP_PROPERTIES_PART: &str = "docProps/app.xml";
pub const DEFAULT_VBA_PROJECT_PART: &str = "xl/vbaProject.bin";

pub const ODF_MIMETYPE_PART: &str = "mimetype";
pub const ODF_CONTENT_PART: &str = "content.xml";
pub const ODF_STYLES_PART: &str = "styles.xml";
pub const ODF_SETTINGS_PART: &str = "settings.xml";

pub const ODF_SPREADSHEET_MIME: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const ODF_SPREADSHEET_TEMPLATE_MIME: &str =
    "application/vnd.oasis.opendocument.spreadsheet-template";

/// Directorios ODF que contienen bibliotecas de macros, scripts y diálogos.
pub const ODF_OBJECT_REPLACEMENTS_DIR: &str = "ObjectReplacements/";
pub const ODF_MACRO_DIRS: [&str; 3] = ["Basic/", "Scripts/", "Dialogs/"];

pub const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
pub const CALC_CHAIN_REL: &str = "/calcChain";

/// Sufijos de tipos de relación que apuntan a código ejecutable.
pub const MACRO_REL_SUFFIXES: [&str; 6] = [
    "/vbaProject",
    "/vbaProjectSignature",
    "/vbaProjectSignatureAgile",
    "/vbaProjectSignatureV3",
    "/xlMacrosheet",
    "/xlIntlMacrosheet",
];

/// Sufijos de relación de hojas de macros de Excel 4.0.
pub const MACROSHEET_REL_SUFFIXES: [&str; 2] = ["/xlMacrosheet", "/xlIntlMacrosheet"];

pub const VBA_PROJECT_CT: &str = "application/vnd.ms-office.vbaProject";

/// Tipos de contenido de partes con código ejecutable.
pub const MACRO_CONTENT_TYPES: [&str; 6] = [
    VBA_PROJECT_CT,
    "application/vnd.ms-office.vbaProjectSignature",
    "application/vnd.ms-office.vbaProjectSignatureAgile",
    "application/vnd.ms-office.vbaProjectSignatureV3",
    "application/vnd.ms-excel.macrosheet+xml",
    "application/vnd.ms-excel.intlmacrosheet+xml",
];

pub const WORKBOOK_CT: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub const MACRO_WORKBOOK_CT: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";
pub const TEMPLATE_CT: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml";
pub const MACRO_TEMPLATE_CT: &str = "application/vnd.ms-excel.template.macroEnabled.main+xml";

