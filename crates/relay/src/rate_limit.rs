//! Rate Limiter fuer Steuerungsnachrichten
//!
//! Token-Bucket pro Verbindung. Audio-Frames werden nicht gezaehlt.

use std::time::Instant;

/// Ein Token-Bucket fuer eine einzelne Verbindung
#[derive(Debug)]
pub struct TokenBucket {
    /// Aktuelle Token-Anzahl (als f64 fuer Bruchteil-Auffuellung)
    token: f64,
    /// Maximale Token-Anzahl (= Burst-Limit)
    max_token: f64,
    /// Auffuellrate in Token pro Sekunde
    fuellrate: f64,
    /// Letzter Zeitpunkt der Auffuellung
    letzte_auffuellung: Instant,
}

impl TokenBucket {
    pub fn neu(max_anfragen_pro_minute: u32) -> Self {
        let max = max_anfragen_pro_minute.max(1) as f64;
        Self {
            token: max,
            max_token: max,
            fuellrate: max / 60.0,
            letzte_auffuellung: Instant::now(),
        }
    }

    /// Versucht ein Token zu verbrauchen.
    ///
    /// Gibt `Ok(())` zurueck wenn erlaubt, `Err(retry_after_secs)` sonst.
    pub fn verbrauchen(&mut self) -> Result<(), u64> {
        self.auffuellen();
        if self.token >= 1.0 {
            self.token -= 1.0;
            Ok(())
        } else {
            Err(self.retry_after_secs())
        }
    }

    /// Sekunden bis zum naechsten verfuegbaren Token
    fn retry_after_secs(&self) -> u64 {
        let fehlend = 1.0 - self.token;
        if fehlend <= 0.0 {
            return 0;
        }
        (fehlend / self.fuellrate).ceil() as u64
    }

    fn auffuellen(&mut self) {
        let jetzt = Instant::now();
        let vergangen = jetzt.duration_since(self.letzte_auffuellung).as_secs_f64();
        self.token = (self.token + vergangen * self.fuellrate).min(self.max_token);
        self.letzte_auffuellung = jetzt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_bis_zum_limit() {
        let mut bucket = TokenBucket::neu(5);
        for _ in 0..5 {
            assert!(bucket.verbrauchen().is_ok());
        }
        let retry = bucket.verbrauchen().unwrap_err();
        assert!(retry >= 1, "Retry-After muss positiv sein");
    }

    #[test]
    fn auffuellen_nach_wartezeit() {
        let mut bucket = TokenBucket::neu(60);
        for _ in 0..60 {
            bucket.verbrauchen().unwrap();
        }
        assert!(bucket.verbrauchen().is_err());

        // Eine Sekunde zurueckdatieren entspricht einem Token bei 60/min
        bucket.letzte_auffuellung -= std::time::Duration::from_millis(1100);
        assert!(bucket.verbrauchen().is_ok());
    }
}
