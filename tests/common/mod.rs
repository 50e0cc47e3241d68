#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nfo_standard::{NfoError, Result, SchemaFetcher};

pub const SCHEMA_URL: &str = "https://xsd.nfostandard.com/main.xsd";

/// Movie-only subset of the NFO schema, elements in field-table order
pub const MOVIE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="NFOStandard" xmlns="NFOStandard" elementFormDefault="qualified">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="media">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="movie" type="movieType"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="library" minOccurs="0">
          <xs:complexType>
            <xs:sequence>
              <xs:any processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:complexType name="movieType">
    <xs:sequence>
      <xs:element name="title" type="xs:string"/>
      <xs:element name="year" type="xs:integer" minOccurs="0"/>
      <xs:element name="plot" type="xs:string" minOccurs="0"/>
      <xs:element name="runtime" type="xs:integer" minOccurs="0"/>
      <xs:element name="genre" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
      <xs:element name="actor" minOccurs="0" maxOccurs="unbounded">
        <xs:complexType>
          <xs:sequence>
            <xs:element name="name" type="xs:string"/>
            <xs:element name="role" type="xs:string" minOccurs="0"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
      <xs:element name="director" type="xs:string" minOccurs="0" maxOccurs="unbounded"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

/// Wrap a movie body in a complete NFO document pointing at `SCHEMA_URL`
pub fn movie_nfo(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<root xmlns="NFOStandard" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="NFOStandard {}">
  <media>
    <movie>{}</movie>
  </media>
</root>"#,
        SCHEMA_URL, body
    )
}

/// A movie passing both the schema and the recommended-field check
pub fn complete_movie() -> String {
    movie_nfo(
        "<title>Alien</title><year>1979</year><plot>In space.</plot><runtime>117</runtime>\
         <genre>Horror</genre><genre>Sci-Fi</genre>\
         <actor><name>Sigourney Weaver</name><role>Ripley</role></actor>\
         <director>Ridley Scott</director>",
    )
}

/// Write `MOVIE_XSD` as `<dir>/main.xsd` for offline runs
pub fn write_schema_dir(dir: &Path) -> PathBuf {
    let schema_dir = dir.join("xsd");
    std::fs::create_dir_all(&schema_dir).unwrap();
    std::fs::write(schema_dir.join("main.xsd"), MOVIE_XSD).unwrap();
    schema_dir
}

/// Fetcher serving `MOVIE_XSD` after a delay, counting every fetch
pub struct CountingFetcher {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(MOVIE_XSD.as_bytes().to_vec())
    }
}

/// Fetcher that always fails, counting attempts
pub struct FailingFetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SchemaFetcher for FailingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(NfoError::HttpStatus {
            url: url.to_string(),
            status: 503,
        })
    }
}
