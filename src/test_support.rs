//! Contenedores de prueba construidos en memoria.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::ArchiveLimits;

pub(crate) fn default_limits() -> ArchiveLimits {
    ArchiveLimits {
        max_part_bytes: 8 * 1024 * 1024,
        max_total_bytes: 32 * 1024 * 1024,
    }
}

struct Entry {
    name: String,
    data: Vec<u8>,
    stored: bool,
    is_dir: bool,
}

/// Constructor de ZIP para fixtures.
#[derive(Default)]
pub(crate) struct ZipBuilder {
    entries: Vec<Entry>,
}

impl ZipBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            data: data.to_vec(),
            stored: false,
            is_dir: false,
        });
        self
    }

    pub(crate) fn stored(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            data: data.to_vec(),
            stored: true,
            is_dir: false,
        });
        self
    }

    pub(crate) fn dir(mut self, name: &str) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            data: Vec::new(),
            stored: false,
            is_dir: true,
        });
        self
    }

    pub(crate) fn without(mut self, name: &str) -> Self {
        self.entries.retain(|entry| entry.name != name);
        self
    }

    /// Sustituye el contenido de una entrada existente, o la agrega al final.
    pub(crate) fn replacing(mut self, name: &str, data: &[u8]) -> Self {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = data.to_vec(),
            None => return self.file(name, data),
        }
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in self.entries {
            let method = if entry.stored {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if entry.is_dir {
                writer.add_directory(entry.name, options).expect("directorio");
            } else {
                writer.start_file(entry.name, options).expect("entrada");
                writer.write_all(&entry.data).expect("contenido");
            }
        }
        writer.finish().expect("zip").into_inner()
    }
}

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn rels(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{RELS_NS}">"#
    );
    for (id, kind, target) in entries {
        let rel_type = if kind.starts_with("http") {
            (*kind).to_string()
        } else {
            format!("{REL_BASE}/{kind}")
        };
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{rel_type}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn content_types(workbook_ct: &str, overrides: &[(&str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
    );
    xml.push_str(&format!(
        r#"<Override PartName="/xl/workbook.xml" ContentType="{workbook_ct}"/>"#
    ));
    for (part, ct) in overrides {
        xml.push_str(&format!(r#"<Override PartName="{part}" ContentType="{ct}"/>"#));
    }
    xml.push_str("</Types>");
    xml
}

const WORKSHEET_CT: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

fn worksheet(value: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>{value}</t></is></c></row></sheetData></worksheet>"#
    )
}

/// Libro con una sola hoja visible y sin macros.
pub(crate) fn minimal_xlsx() -> ZipBuilder {
    ZipBuilder::new()
        .file(
            "[Content_Types].xml",
            content_types(
                crate::constants::WORKBOOK_CT,
                &[("/xl/worksheets/sheet1.xml", WORKSHEET_CT)],
            )
            .as_bytes(),
        )
        .file(
            "_rels/.rels",
            rels(&[("rId1", "officeDocument", "xl/workbook.xml")]).as_bytes(),
        )
        .file(
            "xl/workbook.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        )
        .file(
            "xl/_rels/workbook.xml.rels",
            rels(&[("rId1", "worksheet", "worksheets/sheet1.xml")]).as_bytes(),
        )
        .file("xl/worksheets/sheet1.xml", worksheet("hola").as_bytes())
}

/// Libro habilitado para macros: `Data` y `Calc` visibles, `Secret` oculta entre ambas.
///
/// `Secret` tiene un dibujo propio, hay un nombre definido local a cada hoja
/// oculta/posterior, cadena de cálculo y `docProps/app.xml` con los títulos.
pub(crate) fn macro_xlsx() -> ZipBuilder {
    ZipBuilder::new()
        .file(
            "[Content_Types].xml",
            content_types(
                crate::constants::MACRO_WORKBOOK_CT,
                &[
                    ("/xl/worksheets/sheet1.xml", WORKSHEET_CT),
                    ("/xl/worksheets/sheet2.xml", WORKSHEET_CT),
                    ("/xl/worksheets/sheet3.xml", WORKSHEET_CT),
                    ("/xl/vbaProject.bin", crate::constants::VBA_PROJECT_CT),
                    (
                        "/xl/vbaProjectSignature.bin",
                        "application/vnd.ms-office.vbaProjectSignature",
                    ),
                    (
                        "/xl/styles.xml",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
                    ),
                    (
                        "/xl/calcChain.xml",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml",
                    ),
                    (
                        "/xl/drawings/drawing1.xml",
                        "application/vnd.openxmlformats-officedocument.drawing+xml",
                    ),
                    (
                        "/docProps/app.xml",
                        "application/vnd.openxmlformats-officedocument.extended-properties+xml",
                    ),
                ],
            )
            .as_bytes(),
        )
        .file(
            "_rels/.rels",
            rels(&[
                ("rId1", "officeDocument", "xl/workbook.xml"),
                (
                    "rId2",
                    "extended-properties",
                    "docProps/app.xml",
                ),
            ])
            .as_bytes(),
        )
        .file(
            "docProps/app.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>Microsoft Excel</Application><HeadingPairs><vt:vector size="2" baseType="variant"><vt:variant><vt:lpstr>Worksheets</vt:lpstr></vt:variant><vt:variant><vt:i4>3</vt:i4></vt:variant></vt:vector></HeadingPairs><TitlesOfParts><vt:vector size="3" baseType="lpstr"><vt:lpstr>Data</vt:lpstr><vt:lpstr>Secret</vt:lpstr><vt:lpstr>Calc</vt:lpstr></vt:vector></TitlesOfParts></Properties>"#,
        )
        .file(
            "xl/workbook.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><fileVersion appName="xl" codeName="{37E998C4-C9E5-D4B9-71C8-EB1FF731991C}"/><workbookPr codeName="ThisWorkbook" defaultThemeVersion="166925"/><bookViews><workbookView xWindow="0" yWindow="0" activeTab="2"/></bookViews><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Secret" sheetId="2" state="hidden" r:id="rId2"/><sheet name="Calc" sheetId="3" r:id="rId3"/></sheets><definedNames><definedName name="_xlnm.Print_Area" localSheetId="1">Secret!$A$1</definedName><definedName name="_xlnm.Print_Area" localSheetId="2">Calc!$A$1</definedName><definedName name="Total">Data!$A$1</definedName></definedNames></workbook>"#,
        )
        .file(
            "xl/_rels/workbook.xml.rels",
            rels(&[
                ("rId1", "worksheet", "worksheets/sheet1.xml"),
                ("rId2", "worksheet", "worksheets/sheet2.xml"),
                ("rId3", "worksheet", "worksheets/sheet3.xml"),
                (
                    "rId4",
                    "http://schemas.microsoft.com/office/2006/relationships/vbaProject",
                    "vbaProject.bin",
                ),
                ("rId5", "styles", "styles.xml"),
                ("rId6", "calcChain", "calcChain.xml"),
            ])
            .as_bytes(),
        )
        .file("xl/worksheets/sheet1.xml", worksheet("datos").as_bytes())
        .file("xl/worksheets/sheet2.xml", worksheet("secreto").as_bytes())
        .file(
            "xl/worksheets/_rels/sheet2.xml.rels",
            rels(&[("rId1", "drawing", "../drawings/drawing1.xml")]).as_bytes(),
        )
        .file("xl/worksheets/sheet3.xml", worksheet("calculo").as_bytes())
        .file(
            "xl/drawings/drawing1.xml",
            br#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing"/>"#,
        )
        .file(
            "xl/styles.xml",
            br#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"/>"#,
        )
        .file(
            "xl/calcChain.xml",
            br#"<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="A1" i="2"/></calcChain>"#,
        )
        .file("xl/vbaProject.bin", b"\xD0\xCF\x11\xE0vba")
        .file(
            "xl/_rels/vbaProject.bin.rels",
            rels(&[(
                "rId1",
                "http://schemas.microsoft.com/office/2006/relationships/vbaProjectSignature",
                "vbaProjectSignature.bin",
            )])
            .as_bytes(),
        )
        .file("xl/vbaProjectSignature.bin", b"firma")
}

/// Libro sin macros en el que las tres hojas están ocultas.
pub(crate) fn all_hidden_xlsx() -> ZipBuilder {
    ZipBuilder::new()
        .file(
            "[Content_Types].xml",
            content_types(
                crate::constants::WORKBOOK_CT,
                &[
                    ("/xl/worksheets/sheet1.xml", WORKSHEET_CT),
                    ("/xl/worksheets/sheet2.xml", WORKSHEET_CT),
                    ("/xl/worksheets/sheet3.xml", WORKSHEET_CT),
                ],
            )
            .as_bytes(),
        )
        .file(
            "_rels/.rels",
            rels(&[("rId1", "officeDocument", "xl/workbook.xml")]).as_bytes(),
        )
        .file(
            "xl/workbook.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Uno" sheetId="1" state="hidden" r:id="rId1"/><sheet name="Dos" sheetId="2" state="veryHidden" r:id="rId2"/><sheet name="Tres" sheetId="3" state="hidden" r:id="rId3"/></sheets></workbook>"#,
        )
        .file(
            "xl/_rels/workbook.xml.rels",
            rels(&[
                ("rId1", "worksheet", "worksheets/sheet1.xml"),
                ("rId2", "worksheet", "worksheets/sheet2.xml"),
                ("rId3", "worksheet", "worksheets/sheet3.xml"),
            ])
            .as_bytes(),
        )
        .file("xl/worksheets/sheet1.xml", worksheet("uno").as_bytes())
        .file("xl/worksheets/sheet2.xml", worksheet("dos").as_bytes())
        .file("xl/worksheets/sheet3.xml", worksheet("tres").as_bytes())
}

/// Libro cuya única hoja visible es una hoja de macros de Excel 4.0 (`Macro1`);
/// la hoja de datos `Hidden` está oculta.
pub(crate) fn macrosheet_over_hidden_xlsx() -> ZipBuilder {
    minimal_xlsx()
        .replacing(
            "xl/workbook.xml",
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Macro1" sheetId="1" r:id="rId1"/><sheet name="Hidden" sheetId="2" state="hidden" r:id="rId2"/></sheets></workbook>"#,
        )
        .replacing(
            "xl/_rels/workbook.xml.rels",
            rels(&[
                (
                    "rId1",
                    "http://schemas.microsoft.com/office/2006/relationships/xlMacrosheet",
                    "macrosheets/sheet1.xml",
                ),
                ("rId2", "worksheet", "worksheets/sheet1.xml"),
            ])
            .as_bytes(),
        )
        .file(
            "xl/macrosheets/sheet1.xml",
            br#"<xm:macrosheet xmlns:xm="http://schemas.microsoft.com/office/excel/2006/main"><sheetData/></xm:macrosheet>"#,
        )
}

const ODF_CONTENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:script="urn:oasis:names:tc:opendocument:xmlns:script:1.0" xmlns:draw="urn:oasis:names:tc:opendocument:xmlns:drawing:1.0" xmlns:xlink="http://www.w3.org/1999/xlink" office:version="1.3">"#;

fn odf_manifest(extra: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.3"><manifest:file-entry manifest:full-path="/" manifest:version="1.3" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/><manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/><manifest:file-entry manifest:full-path="styles.xml" manifest:media-type="text/xml"/>{extra}</manifest:manifest>"#
    )
}

const ODF_STYLES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-styles xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" office:version="1.3"/>"#;

/// Hoja de cálculo ODF con una tabla visible.
pub(crate) fn minimal_ods() -> ZipBuilder {
    let content = format!(
        r#"{ODF_CONTENT_OPEN}<office:automatic-styles><style:style style:name="ta1" style:family="table"><style:table-properties table:display="true"/></style:style></office:automatic-styles><office:body><office:spreadsheet><table:table table:name="Sheet1" table:style-name="ta1"><table:table-row><table:table-cell><text:p>hola</text:p></table:table-cell></table:table-row></table:table></office:spreadsheet></office:body></office:document-content>"#
    );
    ZipBuilder::new()
        .stored("mimetype", crate::constants::ODF_SPREADSHEET_MIME.as_bytes())
        .file("content.xml", content.as_bytes())
        .file("styles.xml", ODF_STYLES)
        .file("META-INF/manifest.xml", odf_manifest("").as_bytes())
}

/// Hoja ODF con biblioteca Basic, un oyente de eventos y la tabla `Secret` oculta
/// entre `Data` y `Calc`. `settings.xml` marca `Secret` como tabla activa.
pub(crate) fn macro_ods() -> ZipBuilder {
    let content = format!(
        r#"{ODF_CONTENT_OPEN}<office:scripts><office:event-listeners><script:event-listener script:language="ooo:script" script:event-name="dom:load" xlink:href="vnd.sun.star.script:Standard.Module1.Main?language=Basic&amp;location=document"/></office:event-listeners></office:scripts><office:automatic-styles><style:style style:name="ta1" style:family="table"><style:table-properties table:display="true"/></style:style><style:style style:name="ta2" style:family="table"><style:table-properties table:display="false"/></style:style></office:automatic-styles><office:body><office:spreadsheet><table:table table:name="Data" table:style-name="ta1"><table:table-row><table:table-cell><text:p>datos</text:p></table:table-cell></table:table-row></table:table><table:table table:name="Secret" table:style-name="ta2"><table:table-row><table:table-cell><text:p>secreto</text:p></table:table-cell></table:table-row></table:table><table:table table:name="Calc" table:style-name="ta1"/></office:spreadsheet></office:body></office:document-content>"#
    );
    let settings = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-settings xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:config="urn:oasis:names:tc:opendocument:xmlns:config:1.0" office:version="1.3"><office:settings><config:config-item-set config:name="ooo:view-settings"><config:config-item-map-indexed config:name="Views"><config:config-item-map-entry><config:config-item config:name="ViewId" config:type="string">view1</config:config-item><config:config-item-map-named config:name="Tables"><config:config-item-map-entry config:name="Data"><config:config-item config:name="CursorPositionX" config:type="int">0</config:config-item></config:config-item-map-entry><config:config-item-map-entry config:name="Secret"><config:config-item config:name="CursorPositionX" config:type="int">3</config:config-item></config:config-item-map-entry><config:config-item-map-entry config:name="Calc"><config:config-item config:name="CursorPositionX" config:type="int">0</config:config-item></config:config-item-map-entry></config:config-item-map-named><config:config-item config:name="ActiveTable" config:type="string">Secret</config:config-item></config:config-item-map-entry></config:config-item-map-indexed></config:config-item-set></office:settings></office:document-settings>"#;
    let manifest = odf_manifest(
        r#"<manifest:file-entry manifest:full-path="settings.xml" manifest:media-type="text/xml"/><manifest:file-entry manifest:full-path="Basic/" manifest:media-type=""/><manifest:file-entry manifest:full-path="Basic/script-lc.xml" manifest:media-type="text/xml"/><manifest:file-entry manifest:full-path="Basic/Standard/" manifest:media-type=""/><manifest:file-entry manifest:full-path="Basic/Standard/script-lb.xml" manifest:media-type="text/xml"/><manifest:file-entry manifest:full-path="Basic/Standard/Module1.xml" manifest:media-type="text/xml"/>"#,
    );

    ZipBuilder::new()
        .stored("mimetype", crate::constants::ODF_SPREADSHEET_MIME.as_bytes())
        .file("content.xml", content.as_bytes())
        .file("styles.xml", ODF_STYLES)
        .file("settings.xml", settings.as_bytes())
        .dir("Basic/")
        .file("Basic/script-lc.xml", b"<library:libraries/>")
        .dir("Basic/Standard/")
        .file("Basic/Standard/script-lb.xml", b"<library:library/>")
        .file(
            "Basic/Standard/Module1.xml",
            b"<script:module>Sub Main\nEnd Sub</script:module>",
        )
        .file("META-INF/manifest.xml", manifest.as_bytes())
}

/// Hoja ODF con un gráfico (`Object 1`) anclado en la tabla oculta `Grafico`
/// y otro (`Object 2`) en la tabla visible `Data`.
pub(crate) fn chart_ods() -> ZipBuilder {
    let chart = |name: &str| {
        format!(
            r#"<table:shapes><draw:frame draw:name="{name}"><draw:object xlink:href="./{name}" xlink:type="simple"/><draw:image xlink:href="./ObjectReplacements/{name}" xlink:type="simple"/></draw:frame></table:shapes>"#
        )
    };
    let content = format!(
        r#"{ODF_CONTENT_OPEN}<office:automatic-styles><style:style style:name="ta1" style:family="table"><style:table-properties table:display="true"/></style:style><style:style style:name="ta2" style:family="table"><style:table-properties table:display="false"/></style:style></office:automatic-styles><office:body><office:spreadsheet><table:table table:name="Data" table:style-name="ta1">{}<table:table-row><table:table-cell><text:p>datos</text:p></table:table-cell></table:table-row></table:table><table:table table:name="Grafico" table:style-name="ta2">{}<table:table-row><table:table-cell><text:p>oculto</text:p></table:table-cell></table:table-row></table:table></office:spreadsheet></office:body></office:document-content>"#,
        chart("Object 2"),
        chart("Object 1"),
    );
    let object_entries = |name: &str| {
        format!(
            r#"<manifest:file-entry manifest:full-path="{name}/" manifest:version="1.3" manifest:media-type="application/vnd.oasis.opendocument.chart"/><manifest:file-entry manifest:full-path="{name}/content.xml" manifest:media-type="text/xml"/><manifest:file-entry manifest:full-path="{name}/styles.xml" manifest:media-type="text/xml"/><manifest:file-entry manifest:full-path="ObjectReplacements/{name}" manifest:media-type="application/x-openoffice-gdimetafile"/>"#
        )
    };
    let manifest = odf_manifest(&format!("{}{}", object_entries("Object 1"), object_entries("Object 2")));
    let chart_content = br#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" office:version="1.3"/>"#;

    let mut builder = ZipBuilder::new()
        .stored("mimetype", crate::constants::ODF_SPREADSHEET_MIME.as_bytes())
        .file("content.xml", content.as_bytes())
        .file("styles.xml", ODF_STYLES);
    for name in ["Object 1", "Object 2"] {
        builder = builder
            .dir(&format!("{name}/"))
            .file(&format!("{name}/content.xml"), chart_content)
            .file(&format!("{name}/styles.xml"), ODF_STYLES)
            .file(&format!("ObjectReplacements/{name}"), b"GDIMetaFile");
    }
    builder.file("META-INF/manifest.xml", manifest.as_bytes())
}
